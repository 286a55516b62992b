//! Contract negotiation state.
//!
//! The backend keeps negotiation state in a contract's free-text notes as
//! `<note>;<creatorOwnerId>;<stageCode>`. [`Negotiation::decode`] turns that
//! into a structured record once, at the boundary; [`classify`] is the only
//! consumer and never fails.

use serde::{Deserialize, Serialize};

use crate::constants::{FIELD_SEPARATOR, STAGE_CODE_CREATED, STAGE_CODE_SENT};
use crate::models::Contract;
use crate::types::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationStage {
    /// Offer drafted by the initiator, not yet sent.
    Created,
    /// Offer sent (or countered) by the initiator.
    Sent,
}

impl NegotiationStage {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            STAGE_CODE_CREATED => Some(Self::Created),
            STAGE_CODE_SENT => Some(Self::Sent),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Created => STAGE_CODE_CREATED,
            Self::Sent => STAGE_CODE_SENT,
        }
    }
}

/// Decoded negotiation record attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negotiation {
    pub note: String,
    pub initiator: OwnerId,
    pub stage: NegotiationStage,
}

impl Negotiation {
    /// A freshly drafted offer by `initiator`.
    pub fn created(note: impl Into<String>, initiator: OwnerId) -> Self {
        Self {
            note: note.into(),
            initiator,
            stage: NegotiationStage::Created,
        }
    }

    /// The same offer, now sent by `sender`.
    pub fn sent_by(self, sender: OwnerId) -> Self {
        Self {
            initiator: sender,
            stage: NegotiationStage::Sent,
            ..self
        }
    }

    /// Decode packed notes. Missing segments, non-numeric ids and unknown
    /// stage codes all yield `None`.
    pub fn decode(packed: &str) -> Option<Self> {
        let parts: Vec<&str> = packed.split(FIELD_SEPARATOR).collect();
        if parts.len() < 3 {
            return None;
        }
        let initiator = parts[1].trim().parse::<OwnerId>().ok()?;
        let code = parts[2].trim().parse::<i64>().ok()?;
        let stage = NegotiationStage::from_code(code)?;
        Some(Self {
            note: parts[0].to_string(),
            initiator,
            stage,
        })
    }

    /// Pack into the wire form. Separators inside the note are replaced so
    /// the result always decodes back to the same initiator and stage.
    pub fn encode(&self) -> String {
        let note = self.note.replace(FIELD_SEPARATOR, ",");
        format!(
            "{note}{sep}{}{sep}{}",
            self.initiator,
            self.stage.code(),
            sep = FIELD_SEPARATOR
        )
    }

    /// The free-text part of packed notes, for display in forms.
    pub fn note_of(packed: &str) -> &str {
        packed.split(FIELD_SEPARATOR).next().unwrap_or_default()
    }
}

/// Whose turn it is on a contract, seen by one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Idle,
    CreatedByMe,
    SentByMe,
    SentByOther,
    CreatedByOther,
}

/// The single action offered for a contract status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Affordance {
    /// No offer yet: draft one.
    Propose,
    /// Own draft: send it to the other owner.
    Send,
    /// Waiting on the other owner.
    Await,
    /// Offer received: review and countersign.
    Countersign,
}

impl ContractStatus {
    pub fn affordance(self) -> Affordance {
        match self {
            ContractStatus::Idle => Affordance::Propose,
            ContractStatus::CreatedByMe => Affordance::Send,
            ContractStatus::SentByMe | ContractStatus::CreatedByOther => Affordance::Await,
            ContractStatus::SentByOther => Affordance::Countersign,
        }
    }
}

/// Classify `contract` from the point of view of `viewer`.
pub fn classify(contract: Option<&Contract>, viewer: OwnerId) -> ContractStatus {
    let Some(negotiation) = contract.and_then(Contract::negotiation) else {
        return ContractStatus::Idle;
    };
    classify_negotiation(&negotiation, viewer)
}

pub fn classify_negotiation(negotiation: &Negotiation, viewer: OwnerId) -> ContractStatus {
    let mine = negotiation.initiator == viewer;
    match (negotiation.stage, mine) {
        (NegotiationStage::Created, true) => ContractStatus::CreatedByMe,
        (NegotiationStage::Created, false) => ContractStatus::CreatedByOther,
        (NegotiationStage::Sent, true) => ContractStatus::SentByMe,
        (NegotiationStage::Sent, false) => ContractStatus::SentByOther,
    }
}
