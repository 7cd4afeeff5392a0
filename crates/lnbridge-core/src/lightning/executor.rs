use ln_types::NodeId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::lightning::classify::{classify, classify_payment_error, ErrorClass, PaymentFailure};
use crate::lightning::error::LightningError;
use crate::lightning::types::{OpenChannelResult, PayDetails, PayResult};
use crate::metrics::{
    OPEN_CHANNEL_RESULTS_TOTAL, PAY_RESULTS_TOTAL, REMOTE_CALL_LATENCY_SECONDS,
    REMOTE_CALL_RETRIES_TOTAL, REMOTE_ERRORS_TOTAL,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    // Attempts made after the first one.
    pub max_retries: u32,
    #[serde(rename = "delay_secs", with = "duration_secs")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentReply {
    pub payment_error: String,
    pub payment_preimage: Option<Vec<u8>>,
    pub route: Option<PayDetails>,
}

pub fn pay_result_from_reply(reply: PaymentReply) -> PayResult {
    if reply.payment_error.is_empty() && reply.payment_preimage.is_some() {
        return PayResult::Ok(reply.route);
    }
    pay_result_from_message(&reply.payment_error)
}

fn pay_result_from_message(message: &str) -> PayResult {
    match classify_payment_error(message) {
        PaymentFailure::AlreadyPaid => PayResult::Ok(None),
        PaymentFailure::NoRoute => PayResult::CouldNotFindRoute,
        PaymentFailure::Other(text) => PayResult::Error(text),
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        retryable: fn(ErrorClass) -> bool,
        mut call: F,
    ) -> Result<T, LightningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LightningError>>,
    {
        let mut retries = 0u32;
        loop {
            let started = Instant::now();
            let result = call().await;
            REMOTE_CALL_LATENCY_SECONDS
                .with_label_values(&[operation])
                .observe(started.elapsed().as_secs_f64());

            let remote = match &result {
                Err(LightningError::Remote(remote)) => remote,
                _ => return result,
            };
            let class = classify(remote);
            REMOTE_ERRORS_TOTAL.with_label_values(&[class.label()]).inc();
            if !retryable(class) || retries >= self.policy.max_retries {
                return result;
            }

            retries += 1;
            REMOTE_CALL_RETRIES_TOTAL
                .with_label_values(&[operation])
                .inc();
            warn!(
                operation,
                retry = retries,
                max_retries = self.policy.max_retries,
                "retrying after remote error: {remote}"
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    /// Executes a payment. Expected node-side failures come back as a
    /// [`PayResult`]; only transport-level problems are `Err`.
    pub async fn pay<F, Fut>(&self, call: F) -> Result<PayResult, LightningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PaymentReply, LightningError>>,
    {
        let result = match self
            .run_with_retry("pay", |class| class == ErrorClass::Transient, call)
            .await
        {
            Ok(reply) => pay_result_from_reply(reply),
            Err(LightningError::Remote(remote)) => pay_result_from_message(&remote.message),
            Err(other) => return Err(other),
        };
        PAY_RESULTS_TOTAL.with_label_values(&[result.label()]).inc();
        debug!("pay finished with {}", result.label());
        Ok(result)
    }

    // Opens a channel to `node`. `pending_open` lists the remote keys of
    // channels still waiting for confirmation and is only queried when the
    // node reports a duplicate.
    pub async fn open_channel<F, Fut, P, PFut>(
        &self,
        node: &NodeId,
        call: F,
        pending_open: P,
    ) -> Result<OpenChannelResult, LightningError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), LightningError>>,
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<Vec<NodeId>, LightningError>>,
    {
        let result = match self
            .run_with_retry("open_channel", ErrorClass::is_retryable, call)
            .await
        {
            Ok(()) => OpenChannelResult::Ok,
            Err(LightningError::Remote(remote)) => match classify(&remote) {
                ErrorClass::PeerOffline => OpenChannelResult::PeerNotConnected,
                ErrorClass::InsufficientFunds => OpenChannelResult::CannotAffordFunding,
                ErrorClass::DuplicateOrPending => {
                    let pending = pending_open().await?;
                    info!(
                        "duplicate channel to {node}, {} pending open channels",
                        pending.len()
                    );
                    if pending.contains(node) {
                        OpenChannelResult::NeedMoreConf
                    } else {
                        OpenChannelResult::AlreadyExists
                    }
                }
                ErrorClass::TooManyPending => OpenChannelResult::NeedMoreConf,
                ErrorClass::Transient | ErrorClass::TooEarly => OpenChannelResult::NeedMoreConf,
                ErrorClass::Unclassified => return Err(LightningError::Remote(remote)),
            },
            Err(other) => return Err(other),
        };
        OPEN_CHANNEL_RESULTS_TOTAL
            .with_label_values(&[result.label()])
            .inc();
        Ok(result)
    }
}
