//! Operations to perform against an accepted offer.

use std::fmt;

use offerfit_core::{ExecutorInfo, Offer, Resource, TaskInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Reserve {
        resource: Resource,
    },
    Unreserve {
        resource: Resource,
    },
    Create {
        resource: Resource,
    },
    Destroy {
        resource: Resource,
    },
    Launch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        executor: Option<ExecutorInfo>,
        tasks: Vec<TaskInfo>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Reserve,
    Unreserve,
    Create,
    Destroy,
    Launch,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Reserve,
        OperationKind::Unreserve,
        OperationKind::Create,
        OperationKind::Destroy,
        OperationKind::Launch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Reserve => "reserve",
            OperationKind::Unreserve => "unreserve",
            OperationKind::Create => "create",
            OperationKind::Destroy => "destroy",
            OperationKind::Launch => "launch",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Reserve { .. } => OperationKind::Reserve,
            Operation::Unreserve { .. } => OperationKind::Unreserve,
            Operation::Create { .. } => OperationKind::Create,
            Operation::Destroy { .. } => OperationKind::Destroy,
            Operation::Launch { .. } => OperationKind::Launch,
        }
    }

    /// The resource a RESERVE/UNRESERVE/CREATE/DESTROY acts on.
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Operation::Reserve { resource }
            | Operation::Unreserve { resource }
            | Operation::Create { resource }
            | Operation::Destroy { resource } => Some(resource),
            Operation::Launch { .. } => None,
        }
    }
}

/// One operation tied to the offer it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecommendation {
    pub offer_id: String,
    pub agent_id: String,
    pub operation: Operation,
    /// False for bookkeeping launches that are recorded but not sent.
    pub send: bool,
}

impl OfferRecommendation {
    pub fn new(offer: &Offer, operation: Operation) -> Self {
        Self {
            offer_id: offer.id.clone(),
            agent_id: offer.agent_id.clone(),
            operation,
            send: true,
        }
    }

    pub fn reserve(offer: &Offer, resource: Resource) -> Self {
        Self::new(offer, Operation::Reserve { resource })
    }

    pub fn unreserve(offer: &Offer, resource: Resource) -> Self {
        Self::new(offer, Operation::Unreserve { resource })
    }

    pub fn create(offer: &Offer, resource: Resource) -> Self {
        Self::new(offer, Operation::Create { resource })
    }

    pub fn destroy(offer: &Offer, resource: Resource) -> Self {
        Self::new(offer, Operation::Destroy { resource })
    }

    pub fn launch(
        offer: &Offer,
        executor: Option<ExecutorInfo>,
        tasks: Vec<TaskInfo>,
        send: bool,
    ) -> Self {
        Self {
            send,
            ..Self::new(offer, Operation::Launch { executor, tasks })
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

impl fmt::Display for OfferRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::Launch { tasks, .. } => {
                let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
                write!(f, "launch [{}]", names.join(", "))?;
                if !self.send {
                    write!(f, " (not sent)")?;
                }
                Ok(())
            }
            op => {
                // Every non-launch operation carries a resource.
                match op.resource() {
                    Some(r) => write!(
                        f,
                        "{} {} {} id={}",
                        op.kind(),
                        r.name,
                        r.value,
                        r.resource_id().unwrap_or("-")
                    ),
                    None => write!(f, "{}", op.kind()),
                }
            }
        }
    }
}
