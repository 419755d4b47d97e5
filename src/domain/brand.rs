use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Retailer site variant; decides which prober and markup conventions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Zara,
    Bershka,
}

impl Brand {
    pub const ALL: [Brand; 2] = [Brand::Zara, Brand::Bershka];

    /// Resolve the brand from the URL host. Unparseable URLs and foreign hosts yield `None`.
    pub fn detect(url: &str) -> Option<Brand> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|brand| host.contains(brand.domain()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Zara => "zara",
            Brand::Bershka => "bershka",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Brand::Zara => "Zara",
            Brand::Bershka => "Bershka",
        }
    }

    pub fn domain(&self) -> &'static str {
        match self {
            Brand::Zara => "zara.com",
            Brand::Bershka => "bershka.com",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Brand::Zara => "🧵",
            Brand::Bershka => "🧥",
        }
    }

    /// First line of a status block.
    pub fn title_line(&self) -> String {
        format!("<b>{} {}</b>", self.emoji(), self.label())
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zara" => Ok(Brand::Zara),
            "bershka" => Ok(Brand::Bershka),
            other => Err(format!("Unknown brand: {}", other)),
        }
    }
}
