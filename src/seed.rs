//! Seed data: mock doctors shown before anyone onboards, plus the fixed
//! specialty and wilaya catalogs.

use std::sync::RwLock;

use serde_json::{json, Value};

use crate::db::{Document, StoreError};

// ═══════════════════════════════════════════════════════════
// Catalogs
// ═══════════════════════════════════════════════════════════

/// Predefined medical specialties offered in search filters.
pub const SPECIALTIES: &[&str] = &[
    "طب عام",
    "طب الأسنان",
    "طب الأطفال",
    "أمراض القلب",
    "الأمراض الجلدية",
    "طب العيون",
    "أمراض النساء والتوليد",
    "جراحة العظام",
    "الأنف والأذن والحنجرة",
    "الطب النفسي",
    "طب الأعصاب",
    "الجراحة العامة",
];

/// The 58 Algerian wilayas, in official numbering order.
pub const WILAYAS: &[&str] = &[
    "أدرار",
    "الشلف",
    "الأغواط",
    "أم البواقي",
    "باتنة",
    "بجاية",
    "بسكرة",
    "بشار",
    "البليدة",
    "البويرة",
    "تمنراست",
    "تبسة",
    "تلمسان",
    "تيارت",
    "تيزي وزو",
    "الجزائر",
    "الجلفة",
    "جيجل",
    "سطيف",
    "سعيدة",
    "سكيكدة",
    "سيدي بلعباس",
    "عنابة",
    "قالمة",
    "قسنطينة",
    "المدية",
    "مستغانم",
    "المسيلة",
    "معسكر",
    "ورقلة",
    "وهران",
    "البيض",
    "إليزي",
    "برج بوعريريج",
    "بومرداس",
    "الطارف",
    "تندوف",
    "تيسمسيلت",
    "الوادي",
    "خنشلة",
    "سوق أهراس",
    "تيبازة",
    "ميلة",
    "عين الدفلى",
    "النعامة",
    "عين تموشنت",
    "غرداية",
    "غليزان",
    "تيميمون",
    "برج باجي مختار",
    "أولاد جلال",
    "بني عباس",
    "عين صالح",
    "عين قزام",
    "تقرت",
    "جانت",
    "المغير",
    "المنيعة",
];

// ═══════════════════════════════════════════════════════════
// Mock doctors
// ═══════════════════════════════════════════════════════════

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Doctors listed before any real doctor has saved a profile.
pub fn default_doctors() -> Vec<Document> {
    vec![
        object(json!({
            "id": "d1",
            "name": "د. أحمد بن علي",
            "role": "doctor",
            "specialty": "أمراض القلب",
            "location": "شارع ديدوش مراد",
            "wilaya": "الجزائر",
            "bio": "أخصائي في أمراض القلب والشرايين بخبرة طويلة في المستشفيات الجامعية.",
            "phoneNumber": "0550 12 34 56",
            "experience": 15,
            "skills": ["تخطيط القلب", "إيكو القلب"],
            "equipment": ["جهاز تخطيط القلب", "جهاز الإيكو"],
            "rating": 4.8,
            "imageUrl": "/images/doctors/d1.jpg",
            "availableSlots": ["09:00", "10:00", "11:00", "14:00"],
        })),
        object(json!({
            "id": "d2",
            "name": "د. فاطمة الزهراء بوزيد",
            "role": "doctor",
            "specialty": "طب الأطفال",
            "location": "حي السلام",
            "wilaya": "وهران",
            "bio": "طبيبة أطفال تهتم بمتابعة نمو الرضع والتلقيحات.",
            "phoneNumber": "0661 22 33 44",
            "experience": 9,
            "skills": ["متابعة النمو", "التلقيح"],
            "equipment": ["ميزان الرضع"],
            "rating": 4.6,
            "imageUrl": "/images/doctors/d2.jpg",
            "availableSlots": ["08:30", "09:30", "13:00"],
        })),
        object(json!({
            "id": "d3",
            "name": "د. كريم مزياني",
            "role": "doctor",
            "specialty": "طب الأسنان",
            "location": "وسط المدينة",
            "wilaya": "قسنطينة",
            "bio": "جراح أسنان متخصص في التقويم وزراعة الأسنان.",
            "phoneNumber": "0770 98 76 54",
            "experience": 11,
            "skills": ["تقويم الأسنان", "زراعة الأسنان"],
            "equipment": ["كرسي أسنان", "أشعة بانورامية"],
            "rating": 4.5,
            "imageUrl": "/images/doctors/d3.jpg",
            "availableSlots": ["10:00", "15:00", "16:00"],
        })),
        object(json!({
            "id": "d4",
            "name": "د. سارة حمداني",
            "role": "doctor",
            "specialty": "الأمراض الجلدية",
            "location": "شارع الاستقلال",
            "wilaya": "سطيف",
            "bio": "أخصائية في الأمراض الجلدية والتجميل الطبي.",
            "phoneNumber": "0555 44 55 66",
            "experience": 7,
            "skills": ["علاج حب الشباب", "الليزر"],
            "equipment": ["جهاز ليزر"],
            "rating": 4.7,
            "imageUrl": "/images/doctors/d4.jpg",
            "availableSlots": ["09:00", "12:00"],
        })),
        object(json!({
            "id": "d5",
            "name": "د. يوسف عمراني",
            "role": "doctor",
            "specialty": "طب الرياضة",
            "location": "المركب الأولمبي",
            "wilaya": "تلمسان",
            "bio": "طبيب رياضي يتابع إصابات الملاعب وإعادة التأهيل.",
            "phoneNumber": "0662 10 20 30",
            "experience": 6,
            "skills": ["إعادة التأهيل"],
            "equipment": [],
            "rating": 4.3,
            "imageUrl": "/images/doctors/d5.jpg",
            "availableSlots": ["17:00", "18:00"],
        })),
    ]
}

// ═══════════════════════════════════════════════════════════
// SeedDirectory
// ═══════════════════════════════════════════════════════════

/// Process-scoped copy of the seed doctors.
///
/// Doctor profile saves are folded back into the matching seed entry so
/// listings stay current even for doctors that only exist as seeds.
pub struct SeedDirectory {
    doctors: RwLock<Vec<Document>>,
}

impl SeedDirectory {
    pub fn new(doctors: Vec<Document>) -> Self {
        Self {
            doctors: RwLock::new(doctors),
        }
    }

    /// Seed doctors in seed order.
    pub fn doctors(&self) -> Result<Vec<Document>, StoreError> {
        let doctors = self.doctors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(doctors.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let doctors = self.doctors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(doctors.iter().find(|d| seed_id(d) == Some(id)).cloned())
    }

    /// Shallow-merge `patch` into the seed with `id`. Returns `false` when
    /// no such seed exists; unknown ids are never added.
    pub fn merge_update(&self, id: &str, patch: &Document) -> Result<bool, StoreError> {
        let mut doctors = self.doctors.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(seed) = doctors.iter_mut().find(|d| seed_id(d) == Some(id)) else {
            return Ok(false);
        };
        for (key, value) in patch {
            seed.insert(key.clone(), value.clone());
        }
        seed.insert("id".to_string(), Value::String(id.to_string()));
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.doctors.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeedDirectory {
    fn default() -> Self {
        Self::new(default_doctors())
    }
}

fn seed_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fifty_eight_distinct_wilayas() {
        assert_eq!(WILAYAS.len(), 58);
        let unique: HashSet<_> = WILAYAS.iter().collect();
        assert_eq!(unique.len(), 58);
    }

    #[test]
    fn specialties_are_distinct() {
        let unique: HashSet<_> = SPECIALTIES.iter().collect();
        assert_eq!(unique.len(), SPECIALTIES.len());
    }

    #[test]
    fn default_seeds_are_doctors_with_ids() {
        let seeds = default_doctors();
        assert!(!seeds.is_empty());
        for seed in &seeds {
            assert!(seed_id(seed).is_some());
            assert_eq!(seed["role"], json!("doctor"));
        }
    }

    #[test]
    fn get_finds_seed_by_id() {
        let directory = SeedDirectory::default();
        let d1 = directory.get("d1").unwrap().unwrap();
        assert_eq!(d1["wilaya"], json!("الجزائر"));
        assert!(directory.get("nope").unwrap().is_none());
    }

    #[test]
    fn merge_update_touches_only_known_seeds() {
        let directory = SeedDirectory::default();
        let before = directory.len();

        let mut patch = Document::new();
        patch.insert("bio".into(), json!("نبذة جديدة"));
        assert!(directory.merge_update("d2", &patch).unwrap());
        assert_eq!(directory.get("d2").unwrap().unwrap()["bio"], json!("نبذة جديدة"));
        assert_eq!(directory.get("d2").unwrap().unwrap()["specialty"], json!("طب الأطفال"));

        assert!(!directory.merge_update("ghost", &patch).unwrap());
        assert_eq!(directory.len(), before);
    }

    #[test]
    fn merge_update_keeps_id_stable() {
        let directory = SeedDirectory::default();
        let mut patch = Document::new();
        patch.insert("id".into(), json!("other"));
        directory.merge_update("d1", &patch).unwrap();
        assert!(directory.get("d1").unwrap().is_some());
        assert!(directory.get("other").unwrap().is_none());
    }
}
