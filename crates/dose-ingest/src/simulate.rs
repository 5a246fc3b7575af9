//! Synthetic cohort generation.
//!
//! Produces subjects with plausible demographics and regimens, plus a daily
//! bottle event stream with occasional misses, wrong dose sizes and timing
//! slips. Seeded, so the same seed always yields the same cohort.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dose_core::db::Database;
use dose_core::models::{DosingWindow, NewEvent, NewSubject, Prescription};

use crate::{daily_adherence, DoseClassifier, IngestResult};

const FIRST_NAMES: &[&str] = &[
    "Liam", "Noah", "Oliver", "Elijah", "James", "Lucas", "Henry", "Mateo", "Owen", "Ezra",
    "Mia", "Olivia", "Emma", "Ava", "Sophia", "Amelia", "Harper", "Luna", "Nora", "Hazel",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Garcia", "Miller", "Davis", "Martinez", "Lopez",
    "Wilson", "Anderson", "Taylor", "Nguyen", "Lee", "Walker", "Rivera", "Campbell", "Evans",
];

const RACES: &[(&str, u32)] = &[
    ("White", 60),
    ("Hispanic", 19),
    ("Black", 12),
    ("Asian", 6),
    ("Other", 3),
];

const DOSES_PER_DAY: &[(u32, u32)] = &[(1, 5), (2, 60), (3, 30), (4, 5)];
const PILLS_PER_DOSE: &[(u32, u32)] = &[(1, 75), (2, 20), (3, 5)];

/// Earliest and latest scheduled dose, minutes after midnight.
const EARLIEST_DOSE: u32 = 6 * 60;
const LATEST_DOSE: u32 = 22 * 60;
const ONCE_DAILY_DOSE: u32 = 11 * 60;

/// Per-dose event probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Behaviour {
    /// Dose skipped with no event at all
    pub silent_miss: f64,
    /// Dose skipped but the bottle reports it (code 3, zero score)
    pub reported_miss: f64,
    /// Wrong number of pills taken
    pub wrong_count: f64,
    /// Bottle opened well outside the window
    pub timing_slip: f64,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            silent_miss: 0.06,
            reported_miss: 0.02,
            wrong_count: 0.05,
            timing_slip: 0.08,
        }
    }
}

/// Counts written by [`CohortGenerator::populate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub subjects: usize,
    pub events: usize,
}

/// Seeded generator of synthetic subjects and events.
pub struct CohortGenerator {
    rng: StdRng,
    behaviour: Behaviour,
    classifier: DoseClassifier,
}

impl CohortGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            behaviour: Behaviour::default(),
            classifier: DoseClassifier::new(),
        }
    }

    pub fn with_behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Evenly spaced dose times between 06:00 and 22:00; 11:00 when once daily.
    pub fn dosing_windows(doses_per_day: u32) -> Vec<DosingWindow> {
        let minutes: Vec<u32> = match doses_per_day {
            0 => Vec::new(),
            1 => vec![ONCE_DAILY_DOSE],
            n => {
                let interval = (LATEST_DOSE - EARLIEST_DOSE) / (n - 1);
                (0..n).map(|i| EARLIEST_DOSE + i * interval).collect()
            }
        };

        minutes
            .into_iter()
            .map(|m| {
                let at = format!("{:02}:{:02}", m / 60, m % 60);
                DosingWindow::new(at.clone(), at)
            })
            .collect()
    }

    /// A new subject with random demographics and regimen.
    pub fn subject(&mut self, subject_id: &str) -> NewSubject {
        let male = self.rng.gen_bool(0.5);
        let (height, weight) = if male {
            (self.rng.gen_range(160.0..190.0), self.rng.gen_range(65.0..120.0))
        } else {
            (self.rng.gen_range(148.0..176.0), self.rng.gen_range(50.0..105.0))
        };

        let doses_per_day = self.weighted(DOSES_PER_DAY);
        let pills_per_dose = self.weighted(PILLS_PER_DOSE);
        let race = self.weighted(RACES);

        let mut subject = NewSubject::new(
            subject_id.to_string(),
            self.pick(FIRST_NAMES).to_string(),
            self.pick(LAST_NAMES).to_string(),
        );
        subject.age = self.rng.gen_range(18..=85);
        subject.sex = if male { "M" } else { "F" }.to_string();
        subject.race = race.to_string();
        subject.height = format!("{:.0} cm", height);
        subject.weight = format!("{:.1} kg", weight);
        subject.prescription = Prescription {
            doses_per_day,
            pills_per_dose,
            total_pills_prescribed: self.rng.gen_range(30..=180),
        };
        subject.dosing_windows = Self::dosing_windows(doses_per_day);
        subject.pill_weight = Some((self.rng.gen_range(0.25..1.0_f64) * 1000.0).round() / 1000.0);
        subject
    }

    /// Daily events for `subject` over `days` days starting at `start`.
    pub fn events_for(&mut self, subject: &NewSubject, start: NaiveDate, days: u32) -> Vec<NewEvent> {
        let rx = subject.prescription;
        let grams_per_pill = subject.pill_weight.unwrap_or(0.5);
        let total = i64::from(rx.total_pills_prescribed.max(1));
        let per_dose = i64::from(rx.pills_per_dose.max(1));
        let mut remaining = total;
        let mut events = Vec::new();

        for offset in 0..days {
            let Some(date) = start.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            let mut today_codes: Vec<i64> = Vec::new();

            for window in &subject.dosing_windows {
                let Some(scheduled) = window.start_time() else {
                    continue;
                };
                let roll: f64 = self.rng.gen();
                let b = self.behaviour;

                if roll < b.silent_miss {
                    continue;
                }

                let at = self.jittered(date.and_time(scheduled), roll);
                let mut taken = per_dose;
                let mut reported_miss = false;
                if roll < b.silent_miss + b.reported_miss {
                    taken = 0;
                    reported_miss = true;
                } else if roll < b.silent_miss + b.reported_miss + b.wrong_count {
                    taken = if self.rng.gen_bool(0.5) { per_dose + 1 } else { (per_dose - 1).max(0) };
                }

                if remaining < taken {
                    debug!(subject_id = %subject.subject_id, %date, "bottle refilled");
                    remaining = total;
                }
                remaining -= taken;

                let mut code = if taken != per_dose { 3 } else { 0 };
                if let Some(timing) = self.classifier.timing(at.time(), &subject.dosing_windows) {
                    if !reported_miss {
                        code = timing.code();
                    }
                }
                let score = if reported_miss {
                    0.0
                } else {
                    daily_adherence(&today_codes, code)
                };
                today_codes.push(code);

                events.push(NewEvent {
                    subject_id: subject.subject_id.clone(),
                    date: at.date(),
                    time: at.time(),
                    pill_count: Some(remaining),
                    grams: Some(((remaining as f64) * grams_per_pill * 100.0).round() / 100.0),
                    adherence_score: Some(score),
                    anomaly_code: code,
                });
            }
        }
        events
    }

    /// Insert `subjects` subjects and their events into `db`.
    ///
    /// Subject ids are `1000`, `1001`, ... Each subject's current score is the
    /// share of its events without an anomaly.
    pub fn populate(
        &mut self,
        db: &Database,
        subjects: usize,
        start: NaiveDate,
        days: u32,
    ) -> IngestResult<CohortSummary> {
        let mut summary = CohortSummary::default();

        for i in 0..subjects {
            let subject_id = (1000 + i).to_string();
            let subject = self.subject(&subject_id);
            db.insert_subject(&subject)?;

            let events = self.events_for(&subject, start, days);
            for event in &events {
                db.insert_event(event)?;
            }

            let clean = events.iter().filter(|e| e.anomaly_code == 0).count();
            let score = if events.is_empty() {
                0.0
            } else {
                clean as f64 / events.len() as f64
            };
            db.update_subject_score(&subject_id, score, subject.pill_weight)?;

            summary.subjects += 1;
            summary.events += events.len();
        }

        info!(
            subjects = summary.subjects,
            events = summary.events,
            "synthetic cohort written"
        );
        Ok(summary)
    }

    /// On-time jitter of up to 20 minutes; timing slips move 45-120 minutes.
    fn jittered(&mut self, scheduled: NaiveDateTime, roll: f64) -> NaiveDateTime {
        let b = self.behaviour;
        let slip_from = b.silent_miss + b.reported_miss + b.wrong_count;
        let minutes = if roll >= slip_from && roll < slip_from + b.timing_slip {
            let slip = self.rng.gen_range(45..=120);
            if self.rng.gen_bool(0.5) {
                slip
            } else {
                -slip
            }
        } else {
            self.rng.gen_range(-20..=20)
        };

        // Keep the event on its own calendar day
        let moved = scheduled + Duration::minutes(minutes);
        if moved.date() == scheduled.date() {
            moved
        } else if minutes < 0 {
            scheduled.date().and_time(NaiveTime::MIN)
        } else {
            scheduled
                .date()
                .and_hms_opt(23, 59, 0)
                .unwrap_or(scheduled)
        }
    }

    fn pick<'s>(&mut self, pool: &[&'s str]) -> &'s str {
        pool.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn weighted<T: Copy + Default>(&mut self, choices: &[(T, u32)]) -> T {
        match WeightedIndex::new(choices.iter().map(|(_, w)| *w)) {
            Ok(index) => choices[index.sample(&mut self.rng)].0,
            Err(_) => T::default(),
        }
    }
}
