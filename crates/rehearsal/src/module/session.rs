//! Session helpers.

use super::Module;
use rehearsal_core::session::SharedSession;
use rehearsal_core::{AssertionFailure, HarnessResult};
use rehearsal_telemetry::{debug_section, logging::sections};
use serde_json::Value;
use std::sync::Arc;

impl Module {
    /// Stores a value in the running test's session.
    pub fn have_in_session(&self, key: &str, value: impl Into<Value>) -> HarnessResult<()> {
        let session = self.session()?;
        session.set(key, value.into())?;
        dump(&session);
        Ok(())
    }

    /// Asserts that the session holds `key`, and when `expected` is given,
    /// that it holds exactly that value.
    #[track_caller]
    pub fn see_in_session(&self, key: &str, expected: Option<Value>) -> HarnessResult<()> {
        let session = self.session()?;
        dump(&session);

        if !session.has(key)? {
            AssertionFailure::new(format!("No session variable with key '{key}'")).raise();
        }

        if let Some(expected) = expected {
            let actual = session.get(key, None)?.unwrap_or(Value::Null);
            if actual != expected {
                AssertionFailure::new(format!(
                    "Session variable '{key}' is {actual}, expected {expected}"
                ))
                .raise();
            }
        }
        Ok(())
    }

    /// Asserts several session values at once.
    ///
    /// A `None` value only checks that the key is present.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// module.see_session_has_values([
    ///     ("user", Some(json!("ada"))),
    ///     ("cart", None),
    /// ])?;
    /// ```
    #[track_caller]
    pub fn see_session_has_values<I, K>(&self, bindings: I) -> HarnessResult<()>
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: AsRef<str>,
    {
        for (key, expected) in bindings {
            self.see_in_session(key.as_ref(), expected)?;
        }
        Ok(())
    }

    fn session(&self) -> HarnessResult<SharedSession> {
        let session = self.di()?.get::<SharedSession>("session")?;
        Ok(Arc::clone(session.as_ref()))
    }
}

fn dump(session: &SharedSession) {
    if let Some(adapter) = session.adapter() {
        let values = Value::Object(adapter.to_array());
        debug_section!(sections::SESSION, "{values}");
    }
}
