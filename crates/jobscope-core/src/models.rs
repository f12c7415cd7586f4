use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A breakout mapping: category → value, both free-form extracted text.
pub type Breakout = BTreeMap<String, String>;

/// Why a field produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Absence {
    /// The selector matched nothing, or the source text was empty.
    NoMatch,
    /// Content was found but could not be interpreted.
    Unparsable(String),
}

/// Outcome of evaluating one field against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extracted<T> {
    Present(T),
    Absent(Absence),
}

impl<T> Extracted<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Extracted::Present(value) => Some(value),
            Extracted::Absent(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Extracted::Present(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        match self {
            Extracted::Present(value) => Extracted::Present(f(value)),
            Extracted::Absent(absence) => Extracted::Absent(absence),
        }
    }
}

/// A value produced by a field spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Breakout(Breakout),
}

/// The shape a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Breakout,
}

/// Identifies one field of a [`PartialRecord`].
///
/// Each field is owned by exactly one crawl stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    AvgSalary,
    SalaryByExperience,
    SalaryByCity,
    EducationDemand,
    ExperienceDemand,
    CityDemand,
}

impl FieldId {
    /// All fields, in export column order.
    pub const ALL: [FieldId; 6] = [
        FieldId::AvgSalary,
        FieldId::SalaryByExperience,
        FieldId::SalaryByCity,
        FieldId::EducationDemand,
        FieldId::ExperienceDemand,
        FieldId::CityDemand,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            FieldId::AvgSalary => FieldKind::Scalar,
            _ => FieldKind::Breakout,
        }
    }

    /// Column heading used by the exporter.
    pub fn column(self) -> &'static str {
        match self {
            FieldId::AvgSalary => "average salary",
            FieldId::SalaryByExperience => "salary by experience",
            FieldId::SalaryByCity => "salary by city",
            FieldId::EducationDemand => "education demand",
            FieldId::ExperienceDemand => "experience demand",
            FieldId::CityDemand => "regional demand",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One entity's accumulated fields.
///
/// Every slot is `None` until the stage owning it has completed at least
/// once. `Some(Extracted::Absent(_))` means the stage ran but the page
/// yielded nothing for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialRecord {
    pub name: String,
    pub avg_salary: Option<Extracted<String>>,
    pub salary_by_experience: Option<Extracted<Breakout>>,
    pub salary_by_city: Option<Extracted<Breakout>>,
    pub education_demand: Option<Extracted<Breakout>>,
    pub experience_demand: Option<Extracted<Breakout>>,
    pub city_demand: Option<Extracted<Breakout>>,
}

impl PartialRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Overwrite a single field. Other fields are left untouched.
    pub fn apply(&mut self, field: FieldId, value: Extracted<Value>) {
        match field {
            FieldId::AvgSalary => self.avg_salary = Some(into_scalar(value)),
            FieldId::SalaryByExperience => self.salary_by_experience = Some(into_breakout(value)),
            FieldId::SalaryByCity => self.salary_by_city = Some(into_breakout(value)),
            FieldId::EducationDemand => self.education_demand = Some(into_breakout(value)),
            FieldId::ExperienceDemand => self.experience_demand = Some(into_breakout(value)),
            FieldId::CityDemand => self.city_demand = Some(into_breakout(value)),
        }
    }

    /// The breakout slot for `field`, or `None` for scalar fields.
    pub fn breakout(&self, field: FieldId) -> Option<&Option<Extracted<Breakout>>> {
        match field {
            FieldId::AvgSalary => None,
            FieldId::SalaryByExperience => Some(&self.salary_by_experience),
            FieldId::SalaryByCity => Some(&self.salary_by_city),
            FieldId::EducationDemand => Some(&self.education_demand),
            FieldId::ExperienceDemand => Some(&self.experience_demand),
            FieldId::CityDemand => Some(&self.city_demand),
        }
    }

    /// True once the owning stage has written `field` at least once.
    pub fn is_attempted(&self, field: FieldId) -> bool {
        match field {
            FieldId::AvgSalary => self.avg_salary.is_some(),
            other => self.breakout(other).is_some_and(Option::is_some),
        }
    }

    /// True when every field holds a present value.
    pub fn is_complete(&self) -> bool {
        self.avg_salary.as_ref().is_some_and(Extracted::is_present)
            && FieldId::ALL
                .iter()
                .filter_map(|f| self.breakout(*f))
                .all(|slot| slot.as_ref().is_some_and(Extracted::is_present))
    }
}

fn into_scalar(value: Extracted<Value>) -> Extracted<String> {
    match value {
        Extracted::Present(Value::Scalar(s)) => Extracted::Present(s),
        Extracted::Present(Value::Breakout(_)) => {
            Extracted::Absent(Absence::Unparsable("expected a scalar value".into()))
        }
        Extracted::Absent(absence) => Extracted::Absent(absence),
    }
}

fn into_breakout(value: Extracted<Value>) -> Extracted<Breakout> {
    match value {
        Extracted::Present(Value::Breakout(map)) => Extracted::Present(map),
        Extracted::Present(Value::Scalar(_)) => {
            Extracted::Absent(Absence::Unparsable("expected a breakout mapping".into()))
        }
        Extracted::Absent(absence) => Extracted::Absent(absence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakout(pairs: &[(&str, &str)]) -> Breakout {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_record_serializes_outcomes() {
        let mut record = PartialRecord::new("Engineer");
        record.avg_salary = Some(Extracted::Present("8000".into()));
        record.salary_by_city = Some(Extracted::Absent(Absence::NoMatch));
        record.education_demand = Some(Extracted::Absent(Absence::Unparsable("bad".into())));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Engineer");
        assert_eq!(json["avg_salary"]["present"], "8000");
        assert_eq!(json["salary_by_city"]["absent"]["reason"], "no_match");
        assert_eq!(json["education_demand"]["absent"]["detail"], "bad");
        assert!(json["city_demand"].is_null());
    }

    #[test]
    fn test_new_record_has_nothing_attempted() {
        let record = PartialRecord::new("Engineer");
        assert_eq!(record.name, "Engineer");
        for field in FieldId::ALL {
            assert!(!record.is_attempted(field), "{field} should be unattempted");
        }
        assert!(!record.is_complete());
    }

    #[test]
    fn test_apply_sets_only_that_field() {
        let mut record = PartialRecord::new("Engineer");
        record.apply(
            FieldId::EducationDemand,
            Extracted::Present(Value::Breakout(breakout(&[("Bachelor", "70%")]))),
        );

        assert!(record.is_attempted(FieldId::EducationDemand));
        assert!(!record.is_attempted(FieldId::ExperienceDemand));
        assert!(!record.is_attempted(FieldId::AvgSalary));
        assert_eq!(
            record.education_demand,
            Some(Extracted::Present(breakout(&[("Bachelor", "70%")])))
        );
    }

    #[test]
    fn test_absent_counts_as_attempted() {
        let mut record = PartialRecord::new("Engineer");
        record.apply(FieldId::SalaryByCity, Extracted::Absent(Absence::NoMatch));
        assert!(record.is_attempted(FieldId::SalaryByCity));
        assert_eq!(
            record.salary_by_city,
            Some(Extracted::Absent(Absence::NoMatch))
        );
    }

    #[test]
    fn test_kind_mismatch_degrades_to_unparsable() {
        let mut record = PartialRecord::new("Engineer");
        record.apply(
            FieldId::AvgSalary,
            Extracted::Present(Value::Breakout(Breakout::new())),
        );
        assert!(matches!(
            record.avg_salary,
            Some(Extracted::Absent(Absence::Unparsable(_)))
        ));
    }

    #[test]
    fn test_complete_record() {
        let mut record = PartialRecord::new("Engineer");
        record.apply(
            FieldId::AvgSalary,
            Extracted::Present(Value::Scalar("8000".into())),
        );
        for field in FieldId::ALL.into_iter().skip(1) {
            record.apply(field, Extracted::Present(Value::Breakout(Breakout::new())));
        }
        assert!(record.is_complete());
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(FieldId::AvgSalary.kind(), FieldKind::Scalar);
        assert_eq!(FieldId::CityDemand.kind(), FieldKind::Breakout);
        assert_eq!(FieldId::CityDemand.to_string(), "regional demand");
    }
}
