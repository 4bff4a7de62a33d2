use crate::holdings::{self, HoldingsData};
use crate::llm::LlmInvoker;
use crate::pipeline::prompt::PromptContext;
use crate::pipeline::retry::RetryController;
use crate::pipeline::validate::Shape;
use crate::types::{AnalysisResult, ResultStatus};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

/// Symbol under which the combined-portfolio result is keyed
pub const PORTFOLIO_SYMBOL: &str = "PORTFOLIO";

/// One run over the whole portfolio, or one independent run per holding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchMode {
    Portfolio,
    PerHolding,
}

impl DispatchMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "portfolio" | "whole" | "whole-portfolio" => DispatchMode::Portfolio,
            _ => DispatchMode::PerHolding,
        }
    }
}

pub struct Dispatcher<'a> {
    invoker: &'a dyn LlmInvoker,
    max_retries: u32,
    temperature: f32,
    worker_pool: usize,
    deadline: Option<Duration>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        invoker: &'a dyn LlmInvoker,
        max_retries: u32,
        temperature: f32,
        worker_pool: usize,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            invoker,
            max_retries,
            temperature,
            worker_pool: worker_pool.max(1),
            deadline,
        }
    }

    /// Run the retry pipeline for every entity. Every input holding yields
    /// exactly one result, in input order, regardless of completion order.
    pub async fn run_all(&self, data: &HoldingsData, mode: DispatchMode) -> Vec<AnalysisResult> {
        match mode {
            DispatchMode::Portfolio => vec![self.run_portfolio(data).await],
            DispatchMode::PerHolding => self.run_per_holding(data).await,
        }
    }

    async fn run_portfolio(&self, data: &HoldingsData) -> AnalysisResult {
        let summary = holdings::portfolio_summary(data);
        let ctx = PromptContext::Portfolio { summary: &summary };
        let controller = RetryController::new(self.invoker, self.max_retries, self.temperature);
        let work = controller.run(&ctx, Shape::Portfolio);

        match self.deadline {
            Some(d) => match timeout_at(Instant::now() + d, work).await {
                Ok(result) => result,
                Err(_) => timed_out(PORTFOLIO_SYMBOL),
            },
            None => work.await,
        }
    }

    async fn run_per_holding(&self, data: &HoldingsData) -> Vec<AnalysisResult> {
        let total = data.holdings.len();
        let semaphore = Arc::new(Semaphore::new(self.worker_pool));
        let deadline_at = self.deadline.map(|d| Instant::now() + d);

        info!(
            "Dispatching {total} holdings ({} concurrent, retries {})",
            self.worker_pool, self.max_retries
        );

        // Each holding's run is fully independent: own attempt counter, own
        // prompt context, no shared mutable state. join_all returns results
        // in the order the futures were built, which is input order.
        let futures: Vec<_> = data
            .holdings
            .iter()
            .enumerate()
            .map(|(i, holding)| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let work = async {
                        let _permit = semaphore.acquire().await.expect("semaphore closed");
                        let ctx = PromptContext::Holding { holding };
                        let controller =
                            RetryController::new(self.invoker, self.max_retries, self.temperature);
                        controller.run(&ctx, Shape::PerHolding).await
                    };

                    let result = match deadline_at {
                        Some(at) => match timeout_at(at, work).await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!("{}: deadline reached before a terminal state", holding.symbol);
                                timed_out(&holding.symbol)
                            }
                        },
                        None => work.await,
                    };

                    info!("[{}/{}] {} => {}", i + 1, total, holding.symbol, result.status);
                    result
                }
            })
            .collect();

        join_all(futures).await
    }
}

fn timed_out(symbol: &str) -> AnalysisResult {
    AnalysisResult::failed(
        symbol,
        ResultStatus::TimedOut,
        "overall deadline reached before a terminal state",
        Vec::new(),
        0,
    )
}
