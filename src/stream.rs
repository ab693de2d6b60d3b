//! Batch conversion API: emit results as documents complete.
//!
//! [`convert_stream`] takes independent requests and converts up to
//! `config.concurrency` of them at once, each on tokio's blocking pool and
//! each in its own scratch directory. Results arrive in completion order,
//! tagged with the index of the request that produced them; sort by
//! `index` if order matters.
//!
//! A failed document never stops the batch: its error is yielded like any
//! other outcome.

use crate::config::{ConversionConfig, ConversionRequest};
use crate::convert::convert_async;
use crate::error::ConvertError;
use crate::output::ConversionResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// Outcome of one request in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position of the request in the input batch.
    pub index: usize,
    pub source_name: String,
    pub result: Result<ConversionResult, ConvertError>,
}

/// A boxed stream of batch outcomes.
pub type ConversionStream = Pin<Box<dyn Stream<Item = BatchOutcome> + Send>>;

/// Convert a batch of documents concurrently, streaming outcomes as they
/// are ready.
///
/// Must be polled inside a tokio runtime.
pub fn convert_stream(
    requests: Vec<ConversionRequest>,
    config: &ConversionConfig,
) -> ConversionStream {
    info!(
        "Starting batch conversion: {} documents, concurrency {}",
        requests.len(),
        config.concurrency
    );

    let concurrency = config.concurrency.max(1);
    let config = config.clone();

    let s = stream::iter(requests.into_iter().enumerate().map(move |(index, request)| {
        let cfg = config.clone();
        async move {
            let source_name = request.source.name.clone();
            let result = convert_async(request, &cfg).await;
            BatchOutcome {
                index,
                source_name,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Convert a batch and collect every outcome in input order.
pub async fn convert_batch(
    requests: Vec<ConversionRequest>,
    config: &ConversionConfig,
) -> Vec<BatchOutcome> {
    let mut outcomes: Vec<BatchOutcome> = convert_stream(requests, config).collect().await;
    outcomes.sort_by_key(|o| o.index);
    outcomes
}
