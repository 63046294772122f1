use crate::tx::{Transaction, UtxoEntry};
use thiserror::Error;

/// Flags controlling script verification behavior
pub type ScriptFlags = u32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script evaluated to false")]
    EvalFalse,

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("signature verification failed: {0}")]
    BadSignature(String),
}

/// The opaque script-verification contract. The consensus core invokes the
/// engine as a boolean verifier and never inspects scripts itself.
pub trait ScriptVerifier: Send + Sync {
    fn verify_script(
        &self,
        tx: &Transaction,
        input_index: usize,
        utxo_entry: &UtxoEntry,
        flags: ScriptFlags,
    ) -> Result<(), ScriptError>;
}

/// An engine accepting every script. Used by tests and by header-trusting
/// contexts which delegate script checks elsewhere.
#[derive(Default, Clone, Copy)]
pub struct PermissiveScriptVerifier;

impl ScriptVerifier for PermissiveScriptVerifier {
    fn verify_script(
        &self,
        _tx: &Transaction,
        _input_index: usize,
        _utxo_entry: &UtxoEntry,
        _flags: ScriptFlags,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}
