//! The canonical output unit: one patient row.
//!
//! [`COLUMNS`] is the column contract shared by the structuring prompt
//! ([`crate::prompts`]), the parser ([`crate::pipeline::parse`]) and the
//! writer ([`crate::pipeline::write`]). The prompt asks the model for exactly
//! this order and the parser maps segments back positionally, so the three
//! must change together.

use serde::{Deserialize, Serialize};

/// Column labels in output order.
pub const COLUMNS: [&str; 6] = ["Name", "Phone", "Email", "CPF", "Date of Birth", "Address"];

/// One patient row.
///
/// All fields are plain text exactly as the model wrote them (trimmed); no
/// coercion or validation happens. A person with several phone numbers
/// appears as several records differing only in `phone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "CPF")]
    pub cpf: String,
    #[serde(rename = "Date of Birth")]
    pub date_of_birth: String,
    #[serde(rename = "Address")]
    pub address: String,
}

impl PatientRecord {
    /// Build a record from the first six cells of a row.
    ///
    /// Returns `None` when fewer than six cells are given; records are never
    /// built from partial rows. Cells past the sixth are ignored.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        match cells {
            [name, phone, email, cpf, dob, address, ..] => Some(Self {
                name: name.as_ref().to_string(),
                phone: phone.as_ref().to_string(),
                email: email.as_ref().to_string(),
                cpf: cpf.as_ref().to_string(),
                date_of_birth: dob.as_ref().to_string(),
                address: address.as_ref().to_string(),
            }),
            _ => None,
        }
    }

    /// Field values in [`COLUMNS`] order.
    pub fn as_row(&self) -> [&str; 6] {
        [
            &self.name,
            &self.phone,
            &self.email,
            &self.cpf,
            &self.date_of_birth,
            &self.address,
        ]
    }
}
