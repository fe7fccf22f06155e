//! Email alert dispatch through the sheet script relay.
//!
//! One invocation sends exactly one POST carrying every recipient; the relay
//! fans out to individual addresses. Nothing is retried here: the caller
//! decides what to tell the user.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::RelayMode;
use crate::logging::DataSource;
use crate::model::{MonitorError, SeverityTier};

const RELAY_ACTION: &str = "manual_alert";

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

/// Ordered list of alert recipients. Adding an address that is already
/// present is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientSet {
    emails: Vec<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list<I, S>(emails: I) -> Result<Self, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for email in emails {
            set.add(email.as_ref())?;
        }
        Ok(set)
    }

    /// Adds an address. The only check is that it contains '@'.
    /// Returns `Ok(false)` if the address was already in the set.
    pub fn add(&mut self, email: &str) -> Result<bool, MonitorError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(MonitorError::InvalidRecipient(email.to_string()));
        }
        if self.emails.iter().any(|e| e == email) {
            return Ok(false);
        }
        self.emails.push(email.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, email: &str) -> bool {
        let email = email.trim();
        let before = self.emails.len();
        self.emails.retain(|e| e != email);
        self.emails.len() != before
    }

    pub fn as_slice(&self) -> &[String] {
        &self.emails
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Relay wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AlertRequest<'a> {
    pub action: &'static str,
    pub emails: &'a [String],
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(rename = "sentTo", default)]
    sent_to: Vec<String>,
}

/// Result of an accepted dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReceipt {
    pub recipients: usize,
    /// Addresses the relay reported as sent. `None` when the response was
    /// not read (fire-and-forget) or could not be decoded; the request is
    /// then assumed accepted.
    pub confirmed: Option<Vec<String>>,
}

/// Dispatch control state: the "send" affordance is disabled while Sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct AlertNotifier {
    client: reqwest::Client,
    url: String,
    mode: RelayMode,
    state: watch::Sender<DispatchState>,
}

/// Restores Idle when dropped, whether the dispatch succeeded, failed or
/// was cancelled mid-flight.
struct SendingGuard<'a> {
    state: &'a watch::Sender<DispatchState>,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(DispatchState::Idle);
    }
}

impl AlertNotifier {
    pub fn new(client: reqwest::Client, url: impl Into<String>, mode: RelayMode) -> Self {
        let (state, _) = watch::channel(DispatchState::Idle);
        Self {
            client,
            url: url.into(),
            mode,
            state,
        }
    }

    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    /// Sends one alert request for the whole recipient set.
    ///
    /// Fails with `NoRecipients` before touching the network when the set is
    /// empty, and with `DispatchInProgress` while another dispatch is running.
    pub async fn dispatch(
        &self,
        recipients: &RecipientSet,
        message: &str,
    ) -> Result<DispatchReceipt, MonitorError> {
        if recipients.is_empty() {
            return Err(MonitorError::NoRecipients);
        }
        let _guard = self.begin()?;

        tracing::info!(
            source = %DataSource::Relay,
            recipients = recipients.len(),
            mode = ?self.mode,
            "dispatching alert"
        );
        self.post(recipients, message).await
    }

    fn begin(&self) -> Result<SendingGuard<'_>, MonitorError> {
        let acquired = self.state.send_if_modified(|state| {
            if *state == DispatchState::Idle {
                *state = DispatchState::Sending;
                true
            } else {
                false
            }
        });
        if !acquired {
            return Err(MonitorError::DispatchInProgress);
        }
        Ok(SendingGuard { state: &self.state })
    }

    async fn post(
        &self,
        recipients: &RecipientSet,
        message: &str,
    ) -> Result<DispatchReceipt, MonitorError> {
        let request = AlertRequest {
            action: RELAY_ACTION,
            emails: recipients.as_slice(),
            message,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| MonitorError::Dispatch(e.to_string()))?;

        let mut receipt = DispatchReceipt {
            recipients: recipients.len(),
            confirmed: None,
        };

        if self.mode == RelayMode::FireAndForget {
            return Ok(receipt);
        }

        if !response.status().is_success() {
            return Err(MonitorError::Dispatch(format!(
                "relay returned HTTP {}",
                response.status().as_u16()
            )));
        }

        match response.json::<RelayResponse>().await {
            Ok(body) => receipt.confirmed = Some(body.sent_to),
            Err(e) => tracing::warn!(
                source = %DataSource::Relay,
                error = %e,
                "relay response unreadable, assuming accepted"
            ),
        }
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Automatic dispatch on escalation
// ---------------------------------------------------------------------------

/// Fires once each time the tier climbs to or past a trigger tier.
///
/// Staying at or above the trigger does not re-fire; dropping below it and
/// climbing back does.
#[derive(Debug, Clone)]
pub struct EscalationTrigger {
    trigger: SeverityTier,
    last: SeverityTier,
}

impl EscalationTrigger {
    pub fn new(trigger: SeverityTier) -> Self {
        Self {
            trigger,
            last: SeverityTier::Normal,
        }
    }

    /// Records a tier; returns `true` if this observation should dispatch.
    pub fn observe(&mut self, tier: SeverityTier) -> bool {
        let fire = tier >= self.trigger && self.last < self.trigger;
        self.last = tier;
        fire
    }
}
