//! Upload Pipeline
//!
//! Moves one image from the local machine into object storage and points a
//! recipe at it:
//!
//! 1. Ask the gateway for a write capability for the file name
//! 2. Write the bytes straight to storage with that capability
//! 3. Hand the public link back to the engine, which updates the record
//!
//! A capability is single use: [`ObjectStore::write`] takes it by value.
//! The pipeline only ever knows the target record's id; it never holds the
//! record itself. Failures end the job at the pipeline boundary and never
//! touch the record store.
//!
//! Job lifecycle:
//!
//! ```text
//! RequestingCredential -> Uploading -> Reconciling -> Done
//!          \                  \              \
//!           +------------------+--------------+--> Failed
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cookbook_common::events::{EventBus, RecipeEvent, UploadStage};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

// ========================================
// Capability types
// ========================================

/// Scoped, short-lived permission to write one object
///
/// Not `Clone`: consuming it in [`ObjectStore::write`] is what makes it
/// single use.
#[derive(Debug)]
pub struct WriteCapability {
    url: String,
    fields: Vec<(String, String)>,
    link: String,
}

impl WriteCapability {
    /// # Arguments
    /// * `url` - Storage endpoint accepting the write
    /// * `fields` - Form fields the endpoint requires, in order
    /// * `link` - Public link of the object once written
    pub fn new(url: impl Into<String>, fields: Vec<(String, String)>, link: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fields,
            link: link.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn link(&self) -> &str {
        &self.link
    }
}

/// Issues write capabilities
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Request a capability for an asset name
    ///
    /// `Ok(None)` means the issuer answered but granted nothing.
    async fn issue(&self, asset_name: &str) -> Result<Option<WriteCapability>>;
}

/// Moves bytes into object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a file using a capability, returning the object's public link
    ///
    /// A rejected write is an error; nothing is assumed to have succeeded.
    async fn write(&self, capability: WriteCapability, file: &UploadFile) -> Result<String>;
}

/// File selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, named after its final path component
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SyncError::InvalidInput(format!("No file name in {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let content_type = guess_content_type(&name).map(str::to_string);
        Ok(Self {
            name,
            bytes,
            content_type,
        })
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// ========================================
// Jobs
// ========================================

/// One upload in flight
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: Uuid,
    pub record_id: String,
    pub asset_name: String,
    stage: UploadStage,
}

impl UploadJob {
    pub fn stage(&self) -> &UploadStage {
        &self.stage
    }
}

/// Result of running a job up to reconciliation
#[derive(Debug)]
pub enum UploadOutcome {
    /// Storage accepted the write; the record should now reference `link`
    Reconcile { job: UploadJob, link: String },
    /// Job ended without producing an image
    Failed { job: UploadJob, error: String },
}

/// Runs upload jobs against a credential issuer and an object store
#[derive(Clone)]
pub struct UploadPipeline {
    issuer: Arc<dyn CredentialIssuer>,
    storage: Arc<dyn ObjectStore>,
    events: EventBus,
}

impl UploadPipeline {
    pub fn new(issuer: Arc<dyn CredentialIssuer>, storage: Arc<dyn ObjectStore>, events: EventBus) -> Self {
        Self {
            issuer,
            storage,
            events,
        }
    }

    /// Create a job in its initial stage
    pub fn start(&self, record_id: impl Into<String>, file: &UploadFile) -> UploadJob {
        let job = UploadJob {
            id: Uuid::new_v4(),
            record_id: record_id.into(),
            asset_name: file.name.clone(),
            stage: UploadStage::RequestingCredential,
        };
        info!(job_id = %job.id, record_id = %job.record_id, asset = %job.asset_name, "Upload started");
        self.announce(&job);
        job
    }

    /// Drive a job through credential issuance and the storage write
    ///
    /// Credential failures are terminal for the job; there is no retry.
    pub async fn run(&self, mut job: UploadJob, file: UploadFile) -> UploadOutcome {
        let capability = match self.issuer.issue(&job.asset_name).await {
            Ok(Some(capability)) => capability,
            Ok(None) => {
                let error = SyncError::CredentialUnavailable(job.asset_name.clone()).to_string();
                return self.fail(job, error);
            }
            Err(e) => return self.fail(job, format!("Credential request failed: {}", e)),
        };

        self.transition(&mut job, UploadStage::Uploading);
        debug!(job_id = %job.id, bytes = file.bytes.len(), url = %capability.url(), "Writing object");

        match self.storage.write(capability, &file).await {
            Ok(link) => {
                self.transition(&mut job, UploadStage::Reconciling);
                UploadOutcome::Reconcile { job, link }
            }
            Err(e) => self.fail(job, format!("Storage write failed: {}", e)),
        }
    }

    /// Close a job after the engine tried to reconcile it
    ///
    /// `applied` is false when the record vanished before the image arrived.
    pub fn finish(&self, mut job: UploadJob, applied: bool) -> UploadJob {
        if applied {
            info!(job_id = %job.id, record_id = %job.record_id, "Upload reconciled");
            self.transition(&mut job, UploadStage::Done);
        } else {
            warn!(job_id = %job.id, record_id = %job.record_id, "Upload target no longer exists");
            let reason = format!("Recipe {} no longer exists", job.record_id);
            self.transition(&mut job, UploadStage::Failed { reason });
        }
        job
    }

    fn fail(&self, mut job: UploadJob, error: String) -> UploadOutcome {
        warn!(job_id = %job.id, record_id = %job.record_id, error = %error, "Upload failed");
        self.transition(
            &mut job,
            UploadStage::Failed {
                reason: error.clone(),
            },
        );
        UploadOutcome::Failed { job, error }
    }

    fn transition(&self, job: &mut UploadJob, stage: UploadStage) {
        job.stage = stage;
        self.announce(job);
    }

    fn announce(&self, job: &UploadJob) {
        self.events.emit_lossy(RecipeEvent::UploadStateChanged {
            job_id: job.id,
            record_id: job.record_id.clone(),
            stage: job.stage.clone(),
            timestamp: cookbook_common::time::now(),
        });
    }
}
