//! Serializable operations, and the journal written while replaying them.
//!
//! Requests and journal entries are exchanged as NDJSON: one JSON object per
//! line.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::claim::{ClaimUpdate, FileUpload, NewClaim, NewEvidence};
use crate::error::{ErrorKind, Result, ShieldError};
use crate::ledger::LedgerStore;
use crate::policy::{NewPolicy, PolicyUpdate};
use crate::records::{
    Claim, ClaimEvidence, Deposit, Policy, RiskPoolMetrics, RiskPoolWithdrawal, User,
    WithdrawalStatus,
};
use crate::riskpool::NewDeposit;
use crate::shield::Shield;
use crate::types::{Actor, Amount, ClaimId, PolicyId, UserId, WithdrawalId};

/// Every mutating operation of the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    RegisterUser {
        email: String,
        #[serde(default)]
        is_admin: bool,
    },
    SetUserActive {
        user_id: UserId,
        active: bool,
    },
    CreatePolicy(NewPolicy),
    UpdatePolicy {
        policy_id: PolicyId,
        update: PolicyUpdate,
    },
    FileClaim(NewClaim),
    UpdateClaim {
        claim_id: ClaimId,
        update: ClaimUpdate,
    },
    AddTextEvidence {
        claim_id: ClaimId,
        evidence: NewEvidence,
    },
    /// `path` is read from the local filesystem at execution time.
    AddFileEvidence {
        claim_id: ClaimId,
        path: PathBuf,
        upload: FileUpload,
    },
    CreateDeposit(NewDeposit),
    RequestWithdrawal {
        amount: Amount,
        #[serde(default)]
        notes: Option<String>,
    },
    ProcessWithdrawal {
        withdrawal_id: WithdrawalId,
        status: WithdrawalStatus,
        #[serde(default)]
        notes: Option<String>,
    },
    RecomputeMetrics,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterUser { .. } => "register_user",
            Command::SetUserActive { .. } => "set_user_active",
            Command::CreatePolicy(_) => "create_policy",
            Command::UpdatePolicy { .. } => "update_policy",
            Command::FileClaim(_) => "file_claim",
            Command::UpdateClaim { .. } => "update_claim",
            Command::AddTextEvidence { .. } => "add_text_evidence",
            Command::AddFileEvidence { .. } => "add_file_evidence",
            Command::CreateDeposit(_) => "create_deposit",
            Command::RequestWithdrawal { .. } => "request_withdrawal",
            Command::ProcessWithdrawal { .. } => "process_withdrawal",
            Command::RecomputeMetrics => "recompute_metrics",
        }
    }
}

/// The entity a successful command produced or changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    User(User),
    Policy(Policy),
    Claim(Claim),
    Evidence(ClaimEvidence),
    Deposit(Deposit),
    Withdrawal(RiskPoolWithdrawal),
    Metrics(RiskPoolMetrics),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub actor: Actor,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalResult {
    Ok(Outcome),
    Err { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub actor: Actor,
    pub command: Command,
    pub result: JournalResult,
}

impl JournalEntry {
    pub fn is_ok(&self) -> bool {
        matches!(self.result, JournalResult::Ok(_))
    }
}

impl<L: LedgerStore> Shield<L> {
    /// Dispatch one command on behalf of `actor`.
    ///
    /// `RegisterUser` stands in for the identity collaborator's provisioning
    /// and does not check the actor.
    pub fn execute(&mut self, actor: &Actor, command: Command) -> Result<Outcome> {
        let outcome = match command {
            Command::RegisterUser { email, is_admin } => {
                Outcome::User(self.register_user(&email, is_admin)?)
            }
            Command::SetUserActive { user_id, active } => {
                Outcome::User(self.set_user_active(actor, user_id, active)?)
            }
            Command::CreatePolicy(new) => Outcome::Policy(self.create_policy(actor, new)?),
            Command::UpdatePolicy { policy_id, update } => {
                Outcome::Policy(self.update_policy(actor, policy_id, update)?)
            }
            Command::FileClaim(new) => Outcome::Claim(self.file_claim(actor, new)?),
            Command::UpdateClaim { claim_id, update } => {
                Outcome::Claim(self.update_claim(actor, claim_id, update)?)
            }
            Command::AddTextEvidence { claim_id, evidence } => {
                Outcome::Evidence(self.add_text_evidence(actor, claim_id, evidence)?)
            }
            Command::AddFileEvidence { claim_id, path, upload } => {
                let mut reader = BufReader::new(File::open(&path)?);
                Outcome::Evidence(self.add_file_evidence(actor, claim_id, upload, &mut reader)?)
            }
            Command::CreateDeposit(new) => Outcome::Deposit(self.create_deposit(actor, new)?),
            Command::RequestWithdrawal { amount, notes } => {
                Outcome::Withdrawal(self.request_withdrawal(actor, amount, notes)?)
            }
            Command::ProcessWithdrawal { withdrawal_id, status, notes } => {
                Outcome::Withdrawal(self.process_withdrawal(actor, withdrawal_id, status, notes)?)
            }
            Command::RecomputeMetrics => Outcome::Metrics(self.recompute_metrics(actor)?),
        };
        Ok(outcome)
    }

    /// Execute requests in order. A failed request is journaled with its
    /// error kind and the replay carries on.
    pub fn replay<I>(&mut self, requests: I) -> Vec<JournalEntry>
    where
        I: IntoIterator<Item = Request>,
    {
        let mut journal = Vec::new();
        for (seq, Request { actor, command }) in requests.into_iter().enumerate() {
            let seq = seq as u64 + 1;
            let result = match self.execute(&actor, command.clone()) {
                Ok(outcome) => JournalResult::Ok(outcome),
                Err(e) => {
                    warn!(
                        seq,
                        op = command.name(),
                        actor = %actor.user_id,
                        error = %e,
                        "request rejected"
                    );
                    JournalResult::Err { kind: e.kind(), message: e.to_string() }
                }
            };
            journal.push(JournalEntry { seq, actor, command, result });
        }
        journal
    }
}

/// Parse NDJSON requests, ignoring blank lines.
pub fn read_requests<R: BufRead>(reader: R) -> Result<Vec<Request>> {
    let mut requests = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request = serde_json::from_str(&line)
            .map_err(|e| ShieldError::Validation(format!("request line {}: {e}", i + 1)))?;
        requests.push(request);
    }
    Ok(requests)
}

pub fn write_journal<W: Write>(mut writer: W, journal: &[JournalEntry]) -> Result<()> {
    for entry in journal {
        serde_json::to_writer(&mut writer, entry)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
