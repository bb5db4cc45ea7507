use serde::{Deserialize, Serialize};

/// Standard response wrapper used by the catalogue endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Success code carried inside the envelope body
pub const ENVELOPE_OK: i64 = 200;

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        self.code == ENVELOPE_OK
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bangumi {
    #[serde(rename = "ID", alias = "id")]
    pub id: i64,
    pub official_title: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub season: i64,
    #[serde(default)]
    pub poster_link: Option<String>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub rating_avg: f64,
    #[serde(default)]
    pub rating_count: u64,
}

impl Bangumi {
    /// One-line summary for list displays.
    pub fn summary(&self) -> String {
        if self.rating_count > 0 {
            format!(
                "#{} {} ({}) ★{:.1} [{} ratings]",
                self.id, self.official_title, self.year, self.rating_avg, self.rating_count
            )
        } else {
            format!("#{} {} ({})", self.id, self.official_title, self.year)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bangumi_envelope() {
        let json = r#"{"code":200,"message":"ok","data":[{"ID":12,"official_title":"葬送的芙莉莲","year":"2023","season":4,"poster_link":"/p/12.jpg","view_count":1024,"favorite_count":77,"rating_avg":9.4,"rating_count":310}],"total":1}"#;
        let env: Envelope<Vec<Bangumi>> = serde_json::from_str(json).expect("valid envelope");
        assert!(env.is_ok());
        assert_eq!(env.total, Some(1));
        let items = env.data.expect("data present");
        assert_eq!(items[0].id, 12);
        assert_eq!(items[0].summary(), "#12 葬送的芙莉莲 (2023) ★9.4 [310 ratings]");
    }

    #[test]
    fn test_summary_without_ratings() {
        let b = Bangumi {
            id: 3,
            official_title: "Test".into(),
            year: "2024".into(),
            season: 1,
            poster_link: None,
            view_count: 0,
            favorite_count: 0,
            rating_avg: 0.0,
            rating_count: 0,
        };
        assert_eq!(b.summary(), "#3 Test (2024)");
    }
}
