//! ReAct 形式のプロンプト生成と出力解析

use regex::Regex;

use crate::error::ScraperError;

use super::tool::Tool;

const PREFIX: &str =
    "Answer the following questions as best you can. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const SUFFIX: &str = "Begin!

Question: {input}
Thought:{agent_scratchpad}";

const FINAL_ANSWER: &str = "Final Answer:";

/// モデル出力の停止シーケンス
pub fn stop_sequences() -> Vec<String> {
    vec!["\nObservation:".to_string(), "\n\tObservation:".to_string()]
}

/// ツール一覧・書式説明・質問を含むプロンプト
pub fn build_prompt(tools: &[Box<dyn Tool>], input: &str, scratchpad: &str) -> String {
    let tool_lines = tools
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        PREFIX,
        tool_lines,
        FORMAT_INSTRUCTIONS.replace("{tool_names}", &tool_names),
        SUFFIX
            .replace("{input}", input)
            .replace("{agent_scratchpad}", scratchpad)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// モデルの出力そのもの（スクラッチパッドに積む）
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentDecision {
    Action(AgentAction),
    Finish { output: String, log: String },
}

/// "Action: ... Action Input: ..." / "Final Answer: ..." を解析する
#[derive(Debug, Clone)]
pub struct ReactOutputParser {
    action_re: Regex,
}

impl ReactOutputParser {
    pub fn new() -> Result<Self, ScraperError> {
        let action_re =
            Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
                .map_err(|e| ScraperError::Agent(e.to_string()))?;
        Ok(Self { action_re })
    }

    pub fn parse(&self, text: &str) -> Result<AgentDecision, ScraperError> {
        let has_final = text.contains(FINAL_ANSWER);

        if let Some(caps) = self.action_re.captures(text) {
            if has_final {
                return Err(ScraperError::Agent(format!(
                    "Action と Final Answer が両方含まれています: {}",
                    text
                )));
            }
            let tool = caps[1].trim().to_string();
            let raw_input = caps[2]
                .split("\nObservation")
                .next()
                .unwrap_or_default();
            let tool_input = raw_input.trim_matches(' ').trim_matches('"').trim().to_string();
            return Ok(AgentDecision::Action(AgentAction {
                tool,
                tool_input,
                log: text.to_string(),
            }));
        }

        if let Some(pos) = text.rfind(FINAL_ANSWER) {
            return Ok(AgentDecision::Finish {
                output: text[pos + FINAL_ANSWER.len()..].trim().to_string(),
                log: text.to_string(),
            });
        }

        Err(ScraperError::Agent(format!(
            "出力を解析できません: {}",
            text
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ReactOutputParser {
        ReactOutputParser::new().unwrap()
    }

    #[test]
    fn test_parse_action() {
        let decision = parser()
            .parse(" I should scrape it.\nAction: Table Extraction\nAction Input: \"https://example.com\"")
            .unwrap();

        match decision {
            AgentDecision::Action(action) => {
                assert_eq!(action.tool, "Table Extraction");
                assert_eq!(action.tool_input, "https://example.com");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_cuts_hallucinated_observation() {
        let decision = parser()
            .parse("Action: Table Extraction\nAction Input: https://example.com\nObservation: made up")
            .unwrap();
        match decision {
            AgentDecision::Action(action) => assert_eq!(action.tool_input, "https://example.com"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_final_answer() {
        let decision = parser()
            .parse(" I now know the final answer\nFinal Answer: The table has 3 rows.")
            .unwrap();
        assert_eq!(
            decision,
            AgentDecision::Finish {
                output: "The table has 3 rows.".to_string(),
                log: " I now know the final answer\nFinal Answer: The table has 3 rows.".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_both_and_neither() {
        assert!(parser()
            .parse("Action: X\nAction Input: y\nFinal Answer: z")
            .is_err());
        assert!(parser().parse("just rambling").is_err());
    }
}
