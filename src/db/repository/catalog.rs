use std::collections::HashSet;

use super::{DoctorRepository, RepositoryError};
use crate::collation::sort_ar;
use crate::seed::{SPECIALTIES, WILAYAS};

impl DoctorRepository {
    /// Predefined specialties plus every specialty a doctor lists,
    /// de-duplicated and in Arabic collation order.
    pub async fn list_specialties(&self) -> Result<Vec<String>, RepositoryError> {
        let doctors = self.list_doctors().await?;
        Ok(catalog_union(
            SPECIALTIES,
            doctors.iter().filter_map(|d| d.specialty.as_deref()),
        ))
    }

    /// The 58 wilayas plus any other wilaya a doctor lists, in Arabic
    /// collation order.
    pub async fn list_wilayas(&self) -> Result<Vec<String>, RepositoryError> {
        let doctors = self.list_doctors().await?;
        Ok(catalog_union(
            WILAYAS,
            doctors.iter().filter_map(|d| d.wilaya.as_deref()),
        ))
    }
}

/// Union of `predefined` and `found`, trimmed, blanks dropped, sorted.
pub fn catalog_union<'a, I>(predefined: &[&'a str], found: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut values: Vec<String> = predefined
        .iter()
        .copied()
        .chain(found)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_string()))
        .map(str::to_string)
        .collect();
    sort_ar(&mut values);
    values
}
