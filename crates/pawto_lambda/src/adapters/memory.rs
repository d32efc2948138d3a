//! In-memory adapters for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use pawto_core::collection::Collection;
use pawto_core::job::JobDescriptor;
use pawto_core::notification::EmailMessage;
use serde_json::{json, Value};

use super::job_api::{JobError, JobLauncher};
use super::mailer::{MailError, Mailer};
use super::object_store::{ObjectStore, ObjectStoreError};
use super::payment_gateway::{
    CancelOutcome, ConfirmOutcome, ConfirmRequest, GatewayError, PaymentGateway,
};
use super::record_store::{CollectionStore, StoreError};
use crate::handlers::{HandlerSettings, Services};

type InterleavedWrite = Box<dyn FnOnce(&mut Collection) + Send>;

#[derive(Default)]
pub struct MemoryCollectionStore {
    records: Mutex<HashMap<String, Collection>>,
    malformed: Mutex<Vec<String>>,
    interleaved: Mutex<Vec<InterleavedWrite>>,
    fail_inserts: Mutex<bool>,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `collection` as-is, bypassing version checks.
    pub fn seed(&self, collection: Collection) {
        self.records
            .lock()
            .expect("poisoned mutex")
            .insert(collection.collection_id.clone(), collection);
    }

    /// Makes reads of `collection_id` fail as if the stored item were corrupt.
    pub fn mark_malformed(&self, collection_id: &str) {
        self.malformed
            .lock()
            .expect("poisoned mutex")
            .push(collection_id.to_string());
    }

    /// Queues a competing write that lands on the stored record just before
    /// the next `update`, bumping its version.
    pub fn interleave_write(&self, change: impl FnOnce(&mut Collection) + Send + 'static) {
        self.interleaved
            .lock()
            .expect("poisoned mutex")
            .push(Box::new(change));
    }

    /// Makes every following `insert` fail with a backend error.
    pub fn fail_inserts(&self) {
        *self.fail_inserts.lock().expect("poisoned mutex") = true;
    }

    pub fn snapshot(&self, collection_id: &str) -> Option<Collection> {
        self.records
            .lock()
            .expect("poisoned mutex")
            .get(collection_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("poisoned mutex").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CollectionStore for MemoryCollectionStore {
    fn get(&self, collection_id: &str) -> Result<Option<Collection>, StoreError> {
        if self
            .malformed
            .lock()
            .expect("poisoned mutex")
            .iter()
            .any(|id| id == collection_id)
        {
            return Err(StoreError::Malformed(format!(
                "{collection_id}: corrupt test record"
            )));
        }
        Ok(self.snapshot(collection_id))
    }

    fn insert(&self, collection: &Collection) -> Result<(), StoreError> {
        if *self.fail_inserts.lock().expect("poisoned mutex") {
            return Err(StoreError::Backend("injected insert failure".to_string()));
        }
        let mut records = self.records.lock().expect("poisoned mutex");
        if records.contains_key(&collection.collection_id) {
            return Err(StoreError::AlreadyExists(collection.collection_id.clone()));
        }
        records.insert(collection.collection_id.clone(), collection.clone());
        Ok(())
    }

    fn update(&self, collection: &Collection) -> Result<Collection, StoreError> {
        let mut records = self.records.lock().expect("poisoned mutex");
        let Some(stored) = records.get_mut(&collection.collection_id) else {
            return Err(StoreError::Conflict(collection.collection_id.clone()));
        };
        let mut interleaved = self.interleaved.lock().expect("poisoned mutex");
        if !interleaved.is_empty() {
            let change = interleaved.remove(0);
            change(&mut *stored);
            stored.version += 1;
        }
        drop(interleaved);
        if stored.version != collection.version {
            return Err(StoreError::Conflict(collection.collection_id.clone()));
        }
        let mut written = collection.clone();
        written.version += 1;
        *stored = written.clone();
        Ok(written)
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_after_writes: Mutex<Option<usize>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `writes` more uploads succeed, then fails every following one.
    pub fn fail_after(&self, writes: usize) {
        *self.fail_after_writes.lock().expect("poisoned mutex") = Some(writes);
    }

    pub fn seed_object(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .insert(key.to_string(), body.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .keys()
            .cloned()
            .collect()
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .get(key)
            .cloned()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write_object(
        &self,
        key: &str,
        body: &[u8],
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let mut budget = self.fail_after_writes.lock().expect("poisoned mutex");
        match budget.as_mut() {
            Some(0) => {
                return Err(ObjectStoreError::Write {
                    key: key.to_string(),
                    message: "injected write failure".to_string(),
                })
            }
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        self.seed_object(key, body);
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().expect("poisoned mutex").remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, ObjectStoreError> {
        Ok(format!(
            "https://objects.test/{key}?expires={}",
            expires_in.as_secs()
        ))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("poisoned mutex").clone()
    }

    pub fn sent_with_subject(&self, fragment: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.subject.contains(fragment))
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("poisoned mutex")
            .push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedConfirmation {
    pub payment_key: String,
    pub order_id: String,
    pub amount: i64,
}

/// Payment gateway that approves everything unless told otherwise.
pub struct ScriptedPaymentGateway {
    confirm_outcome: Mutex<ConfirmOutcome>,
    cancel_outcome: Mutex<CancelOutcome>,
    confirmations: Mutex<Vec<RecordedConfirmation>>,
    cancellations: Mutex<Vec<String>>,
}

impl Default for ScriptedPaymentGateway {
    fn default() -> Self {
        Self {
            confirm_outcome: Mutex::new(ConfirmOutcome::Approved {
                receipt_url: "https://receipts.test/1".to_string(),
            }),
            cancel_outcome: Mutex::new(CancelOutcome::Cancelled),
            confirmations: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_to_confirm(&self, outcome: ConfirmOutcome) {
        *self.confirm_outcome.lock().expect("poisoned mutex") = outcome;
    }

    pub fn respond_to_cancel(&self, outcome: CancelOutcome) {
        *self.cancel_outcome.lock().expect("poisoned mutex") = outcome;
    }

    pub fn confirmations(&self) -> Vec<RecordedConfirmation> {
        self.confirmations.lock().expect("poisoned mutex").clone()
    }

    pub fn cancellations(&self) -> Vec<String> {
        self.cancellations.lock().expect("poisoned mutex").clone()
    }
}

impl PaymentGateway for ScriptedPaymentGateway {
    fn confirm(&self, request: &ConfirmRequest<'_>) -> Result<ConfirmOutcome, GatewayError> {
        self.confirmations
            .lock()
            .expect("poisoned mutex")
            .push(RecordedConfirmation {
                payment_key: request.payment_key.to_string(),
                order_id: request.order_id.to_string(),
                amount: request.amount,
            });
        Ok(self.confirm_outcome.lock().expect("poisoned mutex").clone())
    }

    fn cancel(&self, payment_key: &str, _reason: &str) -> Result<CancelOutcome, GatewayError> {
        self.cancellations
            .lock()
            .expect("poisoned mutex")
            .push(payment_key.to_string());
        Ok(self.cancel_outcome.lock().expect("poisoned mutex").clone())
    }
}

/// Job launcher that records submissions; status polls time out.
#[derive(Default)]
pub struct RecordingJobLauncher {
    submissions: Mutex<Vec<JobDescriptor>>,
    polls: Mutex<Vec<String>>,
    reject_submissions: Mutex<bool>,
}

impl RecordingJobLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<JobDescriptor> {
        self.submissions.lock().expect("poisoned mutex").clone()
    }

    pub fn polls(&self) -> Vec<String> {
        self.polls.lock().expect("poisoned mutex").clone()
    }

    /// Makes every following submission fail at the transport level.
    pub fn reject_submissions(&self) {
        *self.reject_submissions.lock().expect("poisoned mutex") = true;
    }
}

impl JobLauncher for RecordingJobLauncher {
    fn submit(&self, descriptor: &JobDescriptor) -> Result<Value, JobError> {
        if *self.reject_submissions.lock().expect("poisoned mutex") {
            return Err(JobError::Transport("injected submission failure".to_string()));
        }
        let mut submissions = self.submissions.lock().expect("poisoned mutex");
        submissions.push(descriptor.clone());
        Ok(json!({
            "id": format!("job-{}", submissions.len()),
            "status": "IN_QUEUE",
        }))
    }

    fn poll_status(&self, job_id: &str) -> Result<Value, JobError> {
        self.polls
            .lock()
            .expect("poisoned mutex")
            .push(job_id.to_string());
        Err(JobError::Timeout)
    }
}

/// Every in-memory adapter plus settings, ready to lend out as [`Services`].
pub struct InMemoryServices {
    pub store: MemoryCollectionStore,
    pub objects: MemoryObjectStore,
    pub mailer: RecordingMailer,
    pub payments: ScriptedPaymentGateway,
    pub jobs: RecordingJobLauncher,
    pub settings: HandlerSettings,
}

impl Default for InMemoryServices {
    fn default() -> Self {
        Self::with_settings(HandlerSettings {
            operator_secret: "operator".to_string(),
            operator_email: "ops@pawto.example".to_string(),
            app_url: "https://pawto.example".to_string(),
        })
    }
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: HandlerSettings) -> Self {
        Self {
            store: MemoryCollectionStore::new(),
            objects: MemoryObjectStore::new(),
            mailer: RecordingMailer::new(),
            payments: ScriptedPaymentGateway::new(),
            jobs: RecordingJobLauncher::new(),
            settings,
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            store: &self.store,
            objects: &self.objects,
            mailer: &self.mailer,
            payments: &self.payments,
            jobs: &self.jobs,
            settings: &self.settings,
        }
    }
}
