//! Data categories the analyzer is asked to produce.

use std::fmt;
use std::str::FromStr;

/// A named data category extracted from a demo.
///
/// Order of [`Category::ALL`] is the order files are produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Header,
    Rounds,
    Kills,
    Damages,
    Shots,
    Bomb,
    Smokes,
    Infernos,
    Grenades,
    Footsteps,
    Ticks,
    /// Average damage per round.
    Adr,
    /// Kill/assist/survive/trade percentage.
    Kast,
    Rating,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Header,
        Category::Rounds,
        Category::Kills,
        Category::Damages,
        Category::Shots,
        Category::Bomb,
        Category::Smokes,
        Category::Infernos,
        Category::Grenades,
        Category::Footsteps,
        Category::Ticks,
        Category::Adr,
        Category::Kast,
        Category::Rating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Header => "header",
            Category::Rounds => "rounds",
            Category::Kills => "kills",
            Category::Damages => "damages",
            Category::Shots => "shots",
            Category::Bomb => "bomb",
            Category::Smokes => "smokes",
            Category::Infernos => "infernos",
            Category::Grenades => "grenades",
            Category::Footsteps => "footsteps",
            Category::Ticks => "ticks",
            Category::Adr => "adr",
            Category::Kast => "kast",
            Category::Rating => "rating",
        }
    }

    /// Derived statistics computed by the analyzer from the raw event tables.
    pub fn is_statistic(&self) -> bool {
        matches!(self, Category::Adr | Category::Kast | Category::Rating)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown data category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!(" Kills ".parse::<Category>(), Ok(Category::Kills));
        assert!("weapons".parse::<Category>().is_err());
    }

    #[test]
    fn test_statistics_are_last_three() {
        let stats: Vec<_> = Category::ALL.iter().filter(|c| c.is_statistic()).collect();
        assert_eq!(stats, vec![&Category::Adr, &Category::Kast, &Category::Rating]);
    }
}
