//! Merge rules for credits arriving from overlapping provider endpoints.
//!
//! - Cast: one entry per person per source list; when a person shows up
//!   again, their character name becomes the longest non-empty name seen.
//! - Crew: a set keyed by `(person id, job)`, kept in insertion order.

use crate::models::{
    CastAppearance, CastCredit, Credit, CrewAppearance, CrewCredit, PersonRef, Production,
    ProductionCredits,
};
use crate::tmdb::models::{RawCast, RawCrew};
use std::collections::{HashMap, HashSet};

/// Departments whose members tend to appear only at episode granularity.
const EPISODE_ONLY_DEPARTMENTS: [&str; 2] = ["Crew", "Stunts"];

/// Pick between two character names: the longer non-empty one wins.
///
/// Equal lengths resolve to the lexicographically smaller name so the
/// result does not depend on argument order.
pub fn better_character<'a>(a: &'a str, b: &'a str) -> &'a str {
    let (a_len, b_len) = (a.trim().len(), b.trim().len());
    match a_len.cmp(&b_len) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal => a.min(b),
    }
}

/// Best character name a single provider entry offers, across its own
/// `character` field and every aggregate role.
pub fn best_character(raw: &RawCast) -> String {
    raw.roles
        .iter()
        .filter_map(|role| role.character.as_deref())
        .chain(raw.character.as_deref())
        .fold("", better_character)
        .trim()
        .to_string()
}

fn person_ref(id: u64, name: &str, profile_path: &Option<String>, imdb_id: &Option<String>) -> PersonRef {
    PersonRef {
        id,
        name: name.to_string(),
        profile_path: profile_path.clone(),
        imdb_id: imdb_id.clone().filter(|id| !id.is_empty()),
    }
}

/// Cast member before it is tagged with a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastEntry {
    pub person: PersonRef,
    pub character: String,
    pub order: Option<u32>,
}

impl From<&RawCast> for CastEntry {
    fn from(raw: &RawCast) -> Self {
        Self {
            person: person_ref(raw.id, &raw.name, &raw.profile_path, &raw.imdb_id),
            character: best_character(raw),
            order: raw.order,
        }
    }
}

/// Crew member before it is tagged with a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewEntry {
    pub person: PersonRef,
    pub department: String,
    pub job: String,
}

impl CrewEntry {
    /// One entry per job held. Aggregate credits list jobs in `jobs`;
    /// every other endpoint uses the single `job` field.
    pub fn expand(raw: &RawCrew) -> Vec<CrewEntry> {
        let department = raw.department.clone().unwrap_or_default();
        let mut jobs: Vec<&str> = Vec::new();
        for job in raw
            .job
            .as_deref()
            .into_iter()
            .chain(raw.jobs.iter().filter_map(|j| j.job.as_deref()))
        {
            if !jobs.contains(&job) {
                jobs.push(job);
            }
        }
        if jobs.is_empty() {
            jobs.push("");
        }

        jobs.into_iter()
            .map(|job| CrewEntry {
                person: person_ref(raw.id, &raw.name, &raw.profile_path, &raw.imdb_id),
                department: department.clone(),
                job: job.to_string(),
            })
            .collect()
    }

    /// Stunt and general crew, the contributors season credits tend to miss.
    pub fn is_episode_only_contributor(&self) -> bool {
        EPISODE_ONLY_DEPARTMENTS.contains(&self.department.as_str())
            || self.job.to_lowercase().contains("stunt")
    }

    fn key(&self) -> (u64, String) {
        (self.person.id, self.job.clone())
    }
}

/// Cast accumulated across sources.
#[derive(Debug, Default)]
pub struct CastList {
    entries: Vec<CastEntry>,
    /// Index of each person's first entry
    positions: HashMap<u64, usize>,
}

impl CastList {
    /// Start from the base credits, kept as-is (one person may play
    /// several characters).
    pub fn from_base(raw: &[RawCast]) -> Self {
        let mut list = Self::default();
        for member in raw {
            list.push(CastEntry::from(member));
        }
        list
    }

    fn push(&mut self, entry: CastEntry) {
        self.positions
            .entry(entry.person.id)
            .or_insert(self.entries.len());
        self.entries.push(entry);
    }

    /// Fold in an entry from a richer source: an existing person keeps the
    /// better character name, a new person is appended.
    pub fn merge(&mut self, raw: &RawCast) {
        let incoming = CastEntry::from(raw);
        match self.positions.get(&raw.id) {
            Some(&index) => {
                let existing = &mut self.entries[index];
                let best = better_character(&existing.character, &incoming.character).to_string();
                existing.character = best;
                if existing.order.is_none() {
                    existing.order = incoming.order;
                }
                if existing.person.imdb_id.is_none() {
                    existing.person.imdb_id = incoming.person.imdb_id;
                }
            }
            None => self.push(incoming),
        }
    }

    /// Append only people not yet present.
    pub fn add_if_absent(&mut self, raw: &RawCast) -> bool {
        if self.positions.contains_key(&raw.id) {
            return false;
        }
        self.push(CastEntry::from(raw));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CastEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CastEntry> {
        self.entries
    }
}

/// Crew accumulated across sources, unique by `(person, job)`.
#[derive(Debug, Default)]
pub struct CrewList {
    entries: Vec<CrewEntry>,
    seen: HashSet<(u64, String)>,
}

impl CrewList {
    pub fn from_raw(raw: &[RawCrew]) -> Self {
        let mut list = Self::default();
        list.extend_raw(raw);
        list
    }

    /// Insert unless the same person already holds the same job.
    pub fn insert(&mut self, entry: CrewEntry) -> bool {
        if !self.seen.insert(entry.key()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Union with provider entries. Returns how many were new.
    pub fn extend_raw(&mut self, raw: &[RawCrew]) -> usize {
        raw.iter()
            .flat_map(CrewEntry::expand)
            .filter(|entry| self.insert(entry.clone()))
            .count()
    }

    /// Union with already expanded entries. Returns how many were new.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = CrewEntry>) -> usize {
        entries
            .into_iter()
            .filter(|entry| self.insert(entry.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CrewEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CrewEntry> {
        self.entries
    }
}

/// Stamp every entry with the production it was credited on.
pub fn tag(production: Production, cast: CastList, crew: CrewList) -> ProductionCredits {
    let cast: Vec<CastCredit> = cast
        .into_entries()
        .into_iter()
        .map(|entry| Credit {
            person: entry.person,
            appearance: CastAppearance {
                production_id: production.id,
                media_type: production.media_type,
                character: entry.character,
                order: entry.order,
            },
        })
        .collect();

    let crew: Vec<CrewCredit> = crew
        .into_entries()
        .into_iter()
        .map(|entry| Credit {
            person: entry.person,
            appearance: CrewAppearance {
                production_id: production.id,
                media_type: production.media_type,
                department: entry.department,
                job: entry.job,
            },
        })
        .collect();

    ProductionCredits { cast, crew }
}
