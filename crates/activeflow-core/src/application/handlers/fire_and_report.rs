use super::{ActionContext, FireAndReportAction};
use crate::domain::activeflow::FlowId;
use crate::domain::option::{
    ConversationSendOption, EmailSendOption, MessageSendOption, TranscribeRecordingOption,
    TranscribeStartOption, VariableSetOption, WebhookSendOption,
};
use crate::domain::rpc::{EmailRequest, TranscribeReferenceType, TranscribeRequest, WebhookRequest};
use crate::CoreError;
use activeflow_monitoring::logging::LogExt;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

fn on_end_flow(flow_id: FlowId) -> Option<FlowId> {
    (!flow_id.is_empty()).then_some(flow_id)
}

#[async_trait]
impl FireAndReportAction for MessageSendOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        ctx.rpc
            .message_send(
                &ctx.activeflow.customer_id,
                self.source.clone(),
                self.destinations.clone(),
                self.text.clone(),
            )
            .await
    }
}

#[async_trait]
impl FireAndReportAction for EmailSendOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        ctx.rpc
            .email_send(EmailRequest {
                customer_id: ctx.activeflow.customer_id,
                activeflow_id: ctx.activeflow.id,
                destinations: self.destinations.clone(),
                subject: self.subject.clone(),
                content: self.content.clone(),
            })
            .await
    }
}

#[async_trait]
impl FireAndReportAction for WebhookSendOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        let request = WebhookRequest {
            customer_id: ctx.activeflow.customer_id,
            uri: self.uri.clone(),
            method: self.method.clone(),
            data_type: self.data_type.clone(),
            data: self.data.clone().into_bytes(),
        };

        if self.sync {
            return ctx.rpc.webhook_send(request).await;
        }

        let rpc = Arc::clone(ctx.rpc);
        let activeflow_id = ctx.activeflow.id;
        tokio::spawn(async move {
            let message = format!("Webhook send for activeflow {} failed", activeflow_id);
            rpc.webhook_send(request).await.log_err(&message).ok();
        });
        Ok(())
    }
}

#[async_trait]
impl FireAndReportAction for ConversationSendOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        if self.sync {
            return ctx
                .rpc
                .conversation_send(self.conversation_id, self.text.clone())
                .await;
        }

        let rpc = Arc::clone(ctx.rpc);
        let activeflow_id = ctx.activeflow.id;
        let conversation_id = self.conversation_id;
        let text = self.text.clone();
        tokio::spawn(async move {
            let message = format!(
                "Conversation send to {} for activeflow {} failed",
                conversation_id, activeflow_id
            );
            rpc.conversation_send(conversation_id, text).await.log_err(&message).ok();
        });
        Ok(())
    }
}

#[async_trait]
impl FireAndReportAction for TranscribeStartOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        let call_id = ctx.call_id()?;
        let transcribe_id = ctx
            .rpc
            .transcribe_start(TranscribeRequest {
                customer_id: ctx.activeflow.customer_id,
                activeflow_id: ctx.activeflow.id,
                on_end_flow_id: on_end_flow(self.on_end_flow_id),
                reference_type: TranscribeReferenceType::Call,
                reference_id: call_id,
                language: self.language.clone(),
            })
            .await?;
        debug!(activeflow_id = %ctx.activeflow.id, transcribe_id = %transcribe_id, "Started call transcription");
        Ok(())
    }
}

/// Transcribes every recording of the referenced call. The first failure
/// is reported after the remaining recordings were attempted.
#[async_trait]
impl FireAndReportAction for TranscribeRecordingOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        let call = ctx.rpc.call_get(ctx.call_id()?).await?;

        let mut first_error = None;
        for recording_id in call.recording_ids {
            let res = ctx
                .rpc
                .transcribe_start(TranscribeRequest {
                    customer_id: ctx.activeflow.customer_id,
                    activeflow_id: ctx.activeflow.id,
                    on_end_flow_id: on_end_flow(self.on_end_flow_id),
                    reference_type: TranscribeReferenceType::Recording,
                    reference_id: recording_id,
                    language: self.language.clone(),
                })
                .await;
            if let Err(e) = res {
                warn!(activeflow_id = %ctx.activeflow.id, recording_id = %recording_id, error = %e, "Recording transcription failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FireAndReportAction for VariableSetOption {
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError> {
        if self.key.is_empty() {
            return Err(CoreError::ValidationError(
                "variable_set needs a key".to_string(),
            ));
        }
        ctx.variables
            .set_variable(
                &ctx.activeflow.id,
                HashMap::from([(self.key.clone(), self.value.clone())]),
            )
            .await?;
        Ok(())
    }
}
