//! Small built-in handlers mounted next to the gateway.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::gemini::handler::Handler;
use crate::gemini::request::Request;
use crate::gemini::response::{DEFAULT_MIME, Response};
use crate::gemini::status::Status;

/// A `text/gemini` page describing the running server.
pub struct InfoPage {
    software: String,
}

impl InfoPage {
    pub fn new(software: impl Into<String>) -> Self {
        Self {
            software: software.into(),
        }
    }

    pub fn render(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        format!(
            "# Server info\n\n* server name: {}\n* version: {}\n* local time: {} (unix)\n",
            self.software,
            env!("CARGO_PKG_VERSION"),
            now
        )
    }
}

#[async_trait]
impl Handler for InfoPage {
    async fn serve(&self, response: &mut Response<'_>, _request: &Request) {
        let page = self.render();
        let result = async {
            response.set_status(Status::Success, DEFAULT_MIME).await?;
            response.write(page.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to send info page");
        }
    }
}

/// Asks the client for input, then echoes what it sent.
pub struct QueryPrompt {
    prompt: String,
}

impl QueryPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl Handler for QueryPrompt {
    async fn serve(&self, response: &mut Response<'_>, request: &Request) {
        let result = match request.query().filter(|q| !q.is_empty()) {
            None => response.set_status(Status::Input, self.prompt.as_str()).await,
            Some(query) => {
                let answer = percent_decode_str(query).decode_utf8_lossy();
                let body = format!("HELLO: {}, yes the answer is: {}", request.path(), answer);
                async {
                    response.set_status(Status::Success, DEFAULT_MIME).await?;
                    response.write(body.as_bytes()).await.map(|_| ())
                }
                .await
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to answer prompt");
        }
    }
}
