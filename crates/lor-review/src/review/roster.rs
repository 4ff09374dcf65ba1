use std::io::Write;

use serde::Serialize;

use super::domain::ApplicantRecord;

/// One row of the reviewer grid. Passwords never leave the repository.
#[derive(Debug, Serialize)]
struct RosterRow<'a> {
    username: &'a str,
    email: &'a str,
    full_name: &'a str,
    branch: &'a str,
    specialization: &'a str,
    requirement: &'a str,
    gender: &'a str,
    phone: &'a str,
}

impl<'a> From<&'a ApplicantRecord> for RosterRow<'a> {
    fn from(record: &'a ApplicantRecord) -> Self {
        Self {
            username: record.username.as_str(),
            email: &record.email,
            full_name: record.full_name.as_deref().unwrap_or_default(),
            branch: record.branch.as_deref().unwrap_or_default(),
            specialization: record.specialization.as_deref().unwrap_or_default(),
            requirement: record.requirement.as_deref().unwrap_or_default(),
            gender: record.gender.as_deref().unwrap_or_default(),
            phone: record.phone.as_deref().unwrap_or_default(),
        }
    }
}

/// Write the roster as CSV with a header row, in the order given.
pub fn write_roster<W: Write>(records: &[ApplicantRecord], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);
    for record in records {
        csv_writer.serialize(RosterRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}
