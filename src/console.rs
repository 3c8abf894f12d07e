use crate::error::RemoteServiceError;
use crate::model::TopicRecord;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// Blocks until the operator acknowledges an out-of-band step, such as
/// clicking the confirmation link of an email subscription.
pub struct OperatorGate<R> {
    input: R,
    enabled: bool,
    acknowledged: usize,
}

impl OperatorGate<BufReader<Stdin>> {
    pub fn stdin(enabled: bool) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), enabled)
    }
}

impl<R: AsyncBufRead + Unpin> OperatorGate<R> {
    pub fn new(input: R, enabled: bool) -> Self {
        Self {
            input,
            enabled,
            acknowledged: 0,
        }
    }

    /// Lines the operator has entered so far.
    pub fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Prints `prompt` and waits for one line of input. Returns `false` when
    /// the gate is disabled or the input is closed.
    pub async fn wait(&mut self, prompt: &str) -> std::io::Result<bool> {
        if !self.enabled {
            tracing::debug!(prompt, "Operator gate disabled, continuing");
            return Ok(false);
        }

        println!();
        println!("{prompt}");
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(false);
        }
        self.acknowledged += 1;
        Ok(true)
    }
}

pub fn render_topics(records: &[TopicRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(" Topic: {}\n", record.topic_arn));
        if !record.attributes.is_empty() {
            out.push_str(" Topic attributes\n");
            for (key, value) in &record.attributes {
                out.push_str(&format!(" -{key} : {value}\n"));
            }
        }
        out.push('\n');
    }
    out
}

/// Logs every field of a remote failure.
pub fn report(err: &RemoteServiceError) {
    tracing::error!(
        operation = err.operation,
        status_code = ?err.status_code,
        error_code = ?err.error_code,
        category = %err.category,
        request_id = ?err.request_id,
        "{}",
        err.message
    );
}
