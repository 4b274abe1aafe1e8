use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::experience::ExperienceObject;
use crate::kind::ObjectType;
use crate::receipt::ReuseReceipt;

/// Derive the id of an object using its type's fixed id field.
///
/// The field must hold a non-blank string; the trimmed value is the id.
pub fn object_id_for(object_type: ObjectType, value: &Value) -> Result<String, TypeError> {
    value
        .get(object_type.id_field())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TypeError::MissingId {
            object_type: object_type.to_string(),
            field: object_type.id_field().to_string(),
        })
}

/// A protocol object whose payload the node stores and searches but does not
/// interpret.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericObject {
    pub id: String,
    pub payload: Value,
}

/// A validated protocol object, one case per object type.
///
/// Experience objects and reuse receipts are decoded into typed structs since
/// ranking and reputation reason about their fields; the remaining types are
/// carried structurally.
#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolObject {
    Experience(ExperienceObject),
    Receipt(ReuseReceipt),
    Trace(GenericObject),
    Request(GenericObject),
    Announcement(GenericObject),
    Referral(GenericObject),
    SeedUpdate(GenericObject),
}

impl ProtocolObject {
    /// Decode a JSON object of the given type.
    pub fn from_value(object_type: ObjectType, value: &Value) -> Result<Self, TypeError> {
        if !value.is_object() {
            return Err(TypeError::NotAnObject);
        }
        let id = object_id_for(object_type, value)?;
        let decode_err = |e: serde_json::Error| TypeError::Decode {
            object_type: object_type.to_string(),
            id: id.clone(),
            reason: e.to_string(),
        };
        let generic = || GenericObject {
            id: id.clone(),
            payload: value.clone(),
        };

        Ok(match object_type {
            ObjectType::Eo => {
                let mut eo: ExperienceObject =
                    serde_json::from_value(value.clone()).map_err(decode_err)?;
                eo.eo_id = id.clone();
                Self::Experience(eo)
            }
            ObjectType::Rr => {
                let mut rr: ReuseReceipt =
                    serde_json::from_value(value.clone()).map_err(decode_err)?;
                rr.rr_id = id.clone();
                Self::Receipt(rr)
            }
            ObjectType::Trace => Self::Trace(generic()),
            ObjectType::Request => Self::Request(generic()),
            ObjectType::Aao => Self::Announcement(generic()),
            ObjectType::Referral => Self::Referral(generic()),
            ObjectType::SeedUpdate => Self::SeedUpdate(generic()),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Experience(_) => ObjectType::Eo,
            Self::Receipt(_) => ObjectType::Rr,
            Self::Trace(_) => ObjectType::Trace,
            Self::Request(_) => ObjectType::Request,
            Self::Announcement(_) => ObjectType::Aao,
            Self::Referral(_) => ObjectType::Referral,
            Self::SeedUpdate(_) => ObjectType::SeedUpdate,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Experience(eo) => &eo.eo_id,
            Self::Receipt(rr) => &rr.rr_id,
            Self::Trace(g)
            | Self::Request(g)
            | Self::Announcement(g)
            | Self::Referral(g)
            | Self::SeedUpdate(g) => &g.id,
        }
    }

    pub fn as_experience(&self) -> Option<&ExperienceObject> {
        match self {
            Self::Experience(eo) => Some(eo),
            _ => None,
        }
    }

    pub fn as_receipt(&self) -> Option<&ReuseReceipt> {
        match self {
            Self::Receipt(rr) => Some(rr),
            _ => None,
        }
    }
}
