//! エージェントモジュール
//!
//! 言語モデルが ReAct 形式で「Table Extraction」ツールを呼び出すかを判断する。

mod react;
mod tool;

pub use react::{AgentAction, AgentDecision, ReactOutputParser};
pub use tool::{TableExtractionTool, Tool};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::OpenAiConfig;
use crate::error::ScraperError;
use crate::openai::OpenAiClient;
use crate::service::ScraperService;

/// ReAct ループの既定の最大ステップ数
const DEFAULT_MAX_ITERATIONS: usize = 15;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String, ScraperError>;
}

/// OpenAI の completions API（temperature 0）
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: OpenAiClient,
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: OpenAiClient::new(config),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompletion {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String, ScraperError> {
        self.client.completion(prompt, stop).await
    }
}

/// 1ステップ分の行動と観測
#[derive(Debug, Clone)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub output: String,
    pub steps: Vec<AgentStep>,
}

pub struct Agent {
    llm: Box<dyn LanguageModel>,
    tools: Vec<Box<dyn Tool>>,
    parser: ReactOutputParser,
    max_iterations: usize,
    verbose: bool,
}

impl Agent {
    pub fn new(
        llm: Box<dyn LanguageModel>,
        tools: Vec<Box<dyn Tool>>,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            llm,
            tools,
            parser: ReactOutputParser::new()?,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            verbose: false,
        })
    }

    /// テーブル抽出ツールだけを持つエージェント
    pub fn table_extraction(
        llm: Box<dyn LanguageModel>,
        service: ScraperService,
    ) -> Result<Self, ScraperError> {
        Self::new(llm, vec![Box::new(TableExtractionTool::new(service))])
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn find_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
            .map(|t| t.as_ref())
    }

    pub async fn run(&self, input: &str) -> Result<AgentOutcome, ScraperError> {
        let stop = react::stop_sequences();
        let mut scratchpad = String::new();
        let mut steps = Vec::new();

        for iteration in 0..self.max_iterations {
            let prompt = react::build_prompt(&self.tools, input, &scratchpad);
            let output = self.llm.complete(&prompt, &stop).await?;
            if self.verbose {
                info!("[agent step {}] {}", iteration + 1, output.trim());
            }

            let (action, observation) = match self.parser.parse(&output) {
                Ok(AgentDecision::Finish { output, .. }) => {
                    info!("エージェント完了: {}ステップ", steps.len());
                    return Ok(AgentOutcome { output, steps });
                }
                Ok(AgentDecision::Action(action)) => {
                    let observation = match self.find_tool(&action.tool) {
                        Some(tool) => tool.call(&action.tool_input).await?,
                        None => {
                            warn!("未知のツール: {}", action.tool);
                            format!(
                                "{} is not a valid tool, try one of [{}].",
                                action.tool,
                                self.tool_names()
                            )
                        }
                    };
                    (action, observation)
                }
                Err(e) => {
                    warn!("エージェント出力の解析に失敗: {}", e);
                    let action = AgentAction {
                        tool: "_Exception".to_string(),
                        tool_input: String::new(),
                        log: output.clone(),
                    };
                    (action, "Invalid or incomplete response".to_string())
                }
            };

            if self.verbose {
                info!("[agent observation] {}", observation);
            }
            scratchpad.push_str(&action.log);
            scratchpad.push_str(&format!("\nObservation: {}\nThought: ", observation));
            steps.push(AgentStep {
                action,
                observation,
            });
        }

        Err(ScraperError::Agent(format!(
            "{}ステップ以内に最終回答が得られませんでした",
            self.max_iterations
        )))
    }

    fn tool_names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
