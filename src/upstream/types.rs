//! Response models of the chess.com published-data API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_online: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_streamer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Ratings per time class; the shape varies by player, so it stays untyped.
pub type PlayerStats = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchivesResponse {
    #[serde(default)]
    pub archives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGames {
    #[serde(default)]
    pub games: Vec<Game>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracies: Option<Accuracies>,
    pub white: GamePlayer,
    pub black: GamePlayer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePlayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accuracies {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white: Option<Accuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<Accuracy>,
}

/// Accuracy is published as a number, occasionally as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Accuracy {
    Number(f64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn monthly_games_accept_mixed_accuracy_types() {
        let payload = json!({
            "games": [{
                "url": "https://www.chess.com/game/live/1",
                "end_time": 1_700_000_000,
                "time_class": "blitz",
                "accuracies": { "white": 91.2, "black": "88.4" },
                "white": { "username": "hikaru", "rating": 3200, "result": "win", "@id": "https://api.chess.com/pub/player/hikaru" },
                "black": { "username": "magnuscarlsen", "rating": 3250, "result": "resigned" }
            }]
        });

        let games: MonthlyGames = serde_json::from_value(payload).expect("valid payload");
        let game = &games.games[0];

        assert_eq!(game.white.id.as_deref(), Some("https://api.chess.com/pub/player/hikaru"));
        let accuracies = game.accuracies.as_ref().expect("accuracies");
        assert_eq!(accuracies.white, Some(Accuracy::Number(91.2)));
        assert_eq!(accuracies.black, Some(Accuracy::Text("88.4".to_string())));
    }

    #[test]
    fn profile_omits_missing_fields_when_serialized() {
        let profile: PlayerProfile =
            serde_json::from_value(json!({ "username": "hikaru", "followers": 10 }))
                .expect("valid payload");

        let value = serde_json::to_value(&profile).expect("serializable");
        assert_eq!(value, json!({ "username": "hikaru", "followers": 10 }));
    }

    #[test]
    fn archives_default_to_empty() {
        let archives: ArchivesResponse = serde_json::from_value(json!({})).expect("valid payload");
        assert!(archives.archives.is_empty());
    }
}
