use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::domain::{ApplicationId, ApplicationStep, DocumentRef, JobApplication};
use super::locks::hold;
use super::repository::{
    ContractDocumentProvider, NotificationProvider, ProviderError, Recipient,
};

/// Collaborator failures. Both leave the application untouched and may be retried.
#[derive(Debug, thiserror::Error)]
pub enum SideEffectError {
    #[error("contract generation failed for application {application_id}: {source}")]
    DocumentGenerationFailed {
        application_id: ApplicationId,
        #[source]
        source: ProviderError,
    },
    #[error("contract {document} could not be delivered for application {application_id}: {source}")]
    DeliveryFailed {
        application_id: ApplicationId,
        document: DocumentRef,
        #[source]
        source: ProviderError,
    },
}

impl SideEffectError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DocumentGenerationFailed { .. } | Self::DeliveryFailed { .. }
        )
    }
}

/// Runs the external actions a transition depends on.
///
/// Contract dispatch couples generation and delivery in one call: the caller only commits
/// `CONTRACT_SENT` once this returns `Ok`. Generated artifacts are kept per application so a
/// retry after a delivery failure reuses the document instead of generating another. Once
/// the record carries `contract_ref`, the caller releases the cached entry.
pub struct SideEffectCoordinator {
    documents: Arc<dyn ContractDocumentProvider>,
    notifications: Arc<dyn NotificationProvider>,
    artifacts: Mutex<HashMap<ApplicationId, DocumentRef>>,
}

impl SideEffectCoordinator {
    pub fn new(
        documents: Arc<dyn ContractDocumentProvider>,
        notifications: Arc<dyn NotificationProvider>,
    ) -> Self {
        Self {
            documents,
            notifications,
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub fn requires_side_effect(target: ApplicationStep) -> bool {
        target == ApplicationStep::ContractSent
    }

    /// Generate (or reuse) the contract, then deliver it.
    ///
    /// Callers must hold the application's lock.
    pub fn dispatch_contract(
        &self,
        application: &JobApplication,
        recipient: &Recipient,
    ) -> Result<DocumentRef, SideEffectError> {
        let document = self.contract_for(application)?;

        match self.notifications.send(&document, recipient) {
            Ok(_) => {
                info!(
                    application_id = %application.id,
                    document = %document,
                    "contract delivered"
                );
                Ok(document)
            }
            Err(source) => {
                warn!(
                    application_id = %application.id,
                    document = %document,
                    error = %source,
                    "contract delivery failed; artifact kept for retry"
                );
                Err(SideEffectError::DeliveryFailed {
                    application_id: application.id.clone(),
                    document,
                    source,
                })
            }
        }
    }

    /// Artifact already generated for `application_id`, if any.
    pub fn artifact(&self, application_id: &ApplicationId) -> Option<DocumentRef> {
        hold(&self.artifacts).get(application_id).cloned()
    }

    /// Drop the cached artifact once the application record holds the reference.
    pub fn release(&self, application_id: &ApplicationId) {
        hold(&self.artifacts).remove(application_id);
    }

    fn contract_for(&self, application: &JobApplication) -> Result<DocumentRef, SideEffectError> {
        if let Some(recorded) = &application.contract_ref {
            return Ok(recorded.clone());
        }
        if let Some(existing) = self.artifact(&application.id) {
            return Ok(existing);
        }

        let document = self.documents.generate(application).map_err(|source| {
            warn!(
                application_id = %application.id,
                error = %source,
                "contract generation failed"
            );
            SideEffectError::DocumentGenerationFailed {
                application_id: application.id.clone(),
                source,
            }
        })?;

        hold(&self.artifacts).insert(application.id.clone(), document.clone());
        Ok(document)
    }
}
