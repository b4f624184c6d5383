//! Record helpers (the `orm` part).
//!
//! Records are created and looked up through the registered model classes,
//! inside the transaction `before` opened, so everything written here is
//! rolled back by `after`.

use super::Module;
use rehearsal_core::orm::{model_identity, Criteria, Model, ModelClass};
use rehearsal_core::{AssertionFailure, HarnessResult};
use rehearsal_telemetry::{debug_section, logging::sections};
use serde_json::{Map, Value};
use std::sync::Arc;

impl Module {
    /// Saves a new record and returns its identity.
    ///
    /// Fails the test with the model's validation messages when the record
    /// cannot be saved.
    #[track_caller]
    pub fn have_record(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<Option<Value>> {
        let class = self.models().get(model)?;
        let mut record = class.create(self.di()?)?;
        record.assign(attributes);

        if !record.save() {
            let errors: Vec<String> = record
                .messages()
                .iter()
                .map(ToString::to_string)
                .collect();
            AssertionFailure::new(format!(
                "Record {model} was not saved. Messages: \n{}",
                errors.join("\n")
            ))
            .raise();
        }

        debug_section!(model, "{}", record.to_json());
        Ok(model_identity(class.as_ref(), record.as_ref()))
    }

    /// Asserts that a record with the attributes exists.
    #[track_caller]
    pub fn see_record(&self, model: &str, attributes: &Map<String, Value>) -> HarnessResult<()> {
        let Some(record) = self.find_record(model, attributes)? else {
            AssertionFailure::new(format!(
                "Couldn't find {model} with {}",
                Value::Object(attributes.clone())
            ))
            .raise();
        };
        debug_section!(model, "{}", record.to_json());
        Ok(())
    }

    /// Asserts that no record with the attributes exists.
    #[track_caller]
    pub fn dont_see_record(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<()> {
        let record = self.find_record(model, attributes)?;
        let found = record.as_ref().map_or(Value::Null, |r| r.to_json());
        debug_section!(model, "{found}");
        if record.is_some() {
            AssertionFailure::new(format!(
                "Unexpectedly managed to find {model} with {}",
                Value::Object(attributes.clone())
            ))
            .raise();
        }
        Ok(())
    }

    /// Asserts how many records match the attributes.
    #[track_caller]
    pub fn see_number_of_records(
        &self,
        model: &str,
        number: usize,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<()> {
        let records = self.find_records(model, attributes)?;
        if records.len() != number {
            AssertionFailure::new(format!(
                "Couldn't find {number} records of {model} with {}. Found: {} records.",
                Value::Object(attributes.clone()),
                records.len()
            ))
            .raise();
        }
        let dump = Value::Array(records.iter().map(|r| r.to_json()).collect());
        debug_section!(model, "{dump}");
        Ok(())
    }

    /// Returns the first record matching the attributes.
    pub fn grab_record(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<Option<Box<dyn Model>>> {
        self.find_record(model, attributes)
    }

    fn find_record(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<Option<Box<dyn Model>>> {
        let (class, criteria) = self.query(model, attributes)?;
        class.find_first(self.di()?, &criteria)
    }

    fn find_records(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<Vec<Box<dyn Model>>> {
        let (class, criteria) = self.query(model, attributes)?;
        class.find(self.di()?, &criteria)
    }

    fn query(
        &self,
        model: &str,
        attributes: &Map<String, Value>,
    ) -> HarnessResult<(Arc<dyn ModelClass>, Criteria)> {
        let class = self.models().get(model)?;
        let criteria = Criteria::from_attributes(attributes);
        let bind = Value::Object(criteria.bind().clone());
        debug_section!(sections::QUERY, bind = %bind, "{}", criteria.conditions());
        Ok((class, criteria))
    }
}
