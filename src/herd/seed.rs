use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::herd::{Animal, Group, HerdError, Sex};

struct SeedAnimal {
    tag: &'static str,
    name: &'static str,
    group: Group,
    sex: Sex,
    breed: &'static str,
    weight: f64,
    pregnant: bool,
    age_days: i64,
}

const SEED_HERD: [SeedAnimal; 8] = [
    SeedAnimal { tag: "LS-101", name: "Babe", group: Group::Piglet, sex: Sex::Female, breed: "Yorkshire", weight: 12.5, pregnant: false, age_days: 45 },
    SeedAnimal { tag: "LS-102", name: "Wilbur", group: Group::Piglet, sex: Sex::Male, breed: "Yorkshire", weight: 14.0, pregnant: false, age_days: 50 },
    SeedAnimal { tag: "LS-201", name: "Napoleon", group: Group::Grower, sex: Sex::Male, breed: "Berkshire", weight: 40.0, pregnant: false, age_days: 110 },
    SeedAnimal { tag: "LS-202", name: "Snowball", group: Group::Grower, sex: Sex::Male, breed: "Landrace", weight: 60.0, pregnant: false, age_days: 130 },
    SeedAnimal { tag: "LS-301", name: "Peppa", group: Group::Pregnant, sex: Sex::Female, breed: "Duroc", weight: 165.0, pregnant: true, age_days: 420 },
    SeedAnimal { tag: "LS-401", name: "Major", group: Group::Adult, sex: Sex::Male, breed: "Hampshire", weight: 240.0, pregnant: false, age_days: 900 },
    SeedAnimal { tag: "LS-402", name: "Clover", group: Group::Adult, sex: Sex::Female, breed: "Yorkshire", weight: 190.0, pregnant: false, age_days: 760 },
    SeedAnimal { tag: "LS-501", name: "Muriel", group: Group::Quarantine, sex: Sex::Female, breed: "Tamworth", weight: 95.0, pregnant: false, age_days: 300 },
];

/// The default herd used on first start and after a reset.
pub fn seed_herd(now: DateTime<Utc>) -> Result<Vec<Animal>, HerdError> {
    let today = now.date_naive();
    SEED_HERD
        .iter()
        .enumerate()
        .map(|(idx, seed)| {
            let dob = today
                .checked_sub_signed(Duration::days(seed.age_days))
                .unwrap_or(NaiveDate::MIN);
            Ok(Animal::new(
                format!("seed-{}", idx + 1),
                seed.tag,
                seed.name,
                seed.group,
                seed.sex,
                seed.weight,
                now,
            )?
            .with_breed(seed.breed)
            .with_dob(dob)
            .with_pregnant(seed.pregnant))
        })
        .collect()
}
