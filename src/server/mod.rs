//! Stdio dispatcher: line-delimited JSON requests on stdin, responses
//! on stdout. Owns transport and error-code mapping; the pipeline only
//! returns typed results and errors for it to serialize.

pub mod protocol;

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::server::protocol::{
    CreateParams, DeleteParams, FindParams, InsertParams, Request, Response, codes, error_code,
};
use crate::services::{Pipeline, StoreRegistry};

pub struct StdioServer {
    pipeline: Arc<Pipeline>,
    stores: Arc<StoreRegistry>,
}

impl StdioServer {
    pub fn new(pipeline: Arc<Pipeline>, stores: Arc<StoreRegistry>) -> Self {
        Self { pipeline, stores }
    }

    /// Serve requests until stdin closes, then close all store handles.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        info!("stdio server ready, waiting for requests");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_line(line).await;
            let payload = serde_json::to_string(&response).unwrap_or_else(|_| {
                r#"{"id":null,"error":{"code":"INTERNAL_ERROR","message":"failed to serialize response"}}"#
                    .to_string()
            });
            stdout.write_all(payload.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        info!("stdin closed, shutting down");
        self.stores.close_all();
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to parse request line");
                return Response::failure(Value::Null, codes::PARSE_ERROR, format!("invalid JSON: {e}"));
            }
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        info!(method = %method, "handling request");

        match method.as_str() {
            "insert_document" => {
                let params: InsertParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => return invalid_params(id, e),
                };
                match self
                    .pipeline
                    .insert(&params.text, params.metadata.as_ref(), params.db_name.as_deref())
                    .await
                {
                    Ok(outcome) => Response::success(id, to_value(&outcome)),
                    Err(e) => Response::failure(id, error_code(&e), e.to_string()),
                }
            }
            "find_similar_documents" => {
                let params: FindParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => return invalid_params(id, e),
                };
                match self
                    .pipeline
                    .find(&params.text, params.top_k, params.db_name.as_deref())
                    .await
                {
                    Ok(results) => Response::success(id, to_value(&results)),
                    Err(e) => Response::failure(id, error_code(&e), e.to_string()),
                }
            }
            "delete_document" => {
                let params: DeleteParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => return invalid_params(id, e),
                };
                match self
                    .pipeline
                    .delete(&params.doc_id, params.db_name.as_deref())
                    .await
                {
                    Ok(outcome) => Response::success(id, to_value(&outcome)),
                    Err(e) => Response::failure(id, error_code(&e), e.to_string()),
                }
            }
            "create_database" => {
                let params: CreateParams = match serde_json::from_value(params) {
                    Ok(p) => p,
                    Err(e) => return invalid_params(id, e),
                };
                match self.stores.create(&params.db_name) {
                    Ok(path) => Response::success(
                        id,
                        serde_json::json!({
                            "success": true,
                            "db_path": path.display().to_string(),
                        }),
                    ),
                    Err(e @ crate::error::StoreError::InvalidName(_)) => {
                        Response::failure(id, codes::VALIDATION_ERROR, e.to_string())
                    }
                    Err(e) => Response::failure(id, codes::STORAGE_ERROR, e.to_string()),
                }
            }
            _ => Response::failure(
                id,
                codes::METHOD_NOT_FOUND,
                format!("unknown method: {method}"),
            ),
        }
    }
}

fn invalid_params(id: Value, error: serde_json::Error) -> Response {
    Response::failure(
        id,
        codes::VALIDATION_ERROR,
        format!("invalid params: {error}"),
    )
}

fn to_value(value: &impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
