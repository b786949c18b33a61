//! Domain types shared by the credit fetcher, comparison engine and HTTP layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CastmatchError;

/// Kind of production, as the provider spells it in URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    /// A series; the provider calls these "tv"
    Tv,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = CastmatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(CastmatchError::BadRequest(format!(
                "Unknown media type '{other}', expected 'movie' or 'tv'"
            ))),
        }
    }
}

/// A movie or series, identified by `(media_type, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Production {
    pub id: u64,
    pub media_type: MediaKind,
}

impl Production {
    pub fn new(media_type: MediaKind, id: u64) -> Self {
        Self { id, media_type }
    }

    pub fn movie(id: u64) -> Self {
        Self::new(MediaKind::Movie, id)
    }

    pub fn tv(id: u64) -> Self {
        Self::new(MediaKind::Tv, id)
    }

    pub fn is_series(&self) -> bool {
        self.media_type == MediaKind::Tv
    }

    /// `"{kind}_{id}"`, the fragment every cache key for this production embeds.
    pub fn composite_id(&self) -> String {
        format!("{}_{}", self.media_type, self.id)
    }

    /// Ordering used for comparison cache keys: kind first, then numeric id.
    pub fn sort_key(&self) -> (MediaKind, u64) {
        (self.media_type, self.id)
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.media_type, self.id)
    }
}

/// Person fields carried by every credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: u64,
    pub name: String,
    pub profile_path: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// A cast contribution to one production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastAppearance {
    #[serde(rename = "project_id")]
    pub production_id: u64,
    pub media_type: MediaKind,
    pub character: String,
    pub order: Option<u32>,
}

/// A crew contribution to one production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewAppearance {
    #[serde(rename = "project_id")]
    pub production_id: u64,
    pub media_type: MediaKind,
    pub department: String,
    pub job: String,
}

/// Anything that points back at the production it belongs to.
pub trait Appearance {
    fn production(&self) -> Production;
}

impl Appearance for CastAppearance {
    fn production(&self) -> Production {
        Production::new(self.media_type, self.production_id)
    }
}

impl Appearance for CrewAppearance {
    fn production(&self) -> Production {
        Production::new(self.media_type, self.production_id)
    }
}

/// One person's contribution to one production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit<A> {
    #[serde(flatten)]
    pub person: PersonRef,
    #[serde(flatten)]
    pub appearance: A,
}

pub type CastCredit = Credit<CastAppearance>;
pub type CrewCredit = Credit<CrewAppearance>;

/// Merged cast and crew for a single production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionCredits {
    pub cast: Vec<CastCredit>,
    pub crew: Vec<CrewCredit>,
}

/// A person aggregated across every production in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: u64,
    pub name: String,
    pub profile_path: Option<String>,
    pub imdb_id: Option<String>,
    pub cast_appearances: Vec<CastAppearance>,
    pub crew_appearances: Vec<CrewAppearance>,
}

impl Person {
    pub fn from_ref(person: &PersonRef) -> Self {
        Self {
            id: person.id,
            name: person.name.clone(),
            profile_path: person.profile_path.clone(),
            imdb_id: person.imdb_id.clone(),
            cast_appearances: Vec::new(),
            crew_appearances: Vec::new(),
        }
    }

    pub fn appearance_count(&self) -> usize {
        self.cast_appearances.len() + self.crew_appearances.len()
    }

    /// Distinct productions this person shows up in, in first-seen order.
    pub fn productions(&self) -> Vec<Production> {
        let mut seen = Vec::new();
        let all = self
            .cast_appearances
            .iter()
            .map(Appearance::production)
            .chain(self.crew_appearances.iter().map(Appearance::production));
        for production in all {
            if !seen.contains(&production) {
                seen.push(production);
            }
        }
        seen
    }
}

/// Output of a comparison: the inputs plus everyone credited on any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub projects: Vec<Production>,
    pub people: Vec<Person>,
}
