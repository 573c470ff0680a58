//! Core of the cardiac note explainer: the seven-section document
//! contract, the structured/fallback normalizer, and the approval-gated
//! workflow that carries a clinical note to a patient-facing document.

pub mod adapters;
pub mod audit;
pub mod config;
pub mod determinism;
pub mod document;
pub mod intake;
pub mod locale;
pub mod persistence;
pub mod render;
pub mod validator;
pub mod workflow;

pub mod error;

pub use config::CoreConfig;
pub use document::model::{NormalizedDocument, Provenance, RawGenerationResult, Section};
pub use document::normalizer::DocumentNormalizer;
pub use document::schema::SectionType;
pub use error::{CoreError, CoreResult};
pub use workflow::controller::WorkflowController;
pub use workflow::state::{WorkflowAction, WorkflowState};
