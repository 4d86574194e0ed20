//! Thin clients for the public HTTP APIs the utility and pokemon commands use.

use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::BotError;

const POKEAPI: &str = "https://pokeapi.co/api/v2/";
const JIKAN: &str = "https://api.jikan.moe/v4/";
const WTTR: &str = "https://wttr.in/";
const DICTIONARY: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";
const MYMEMORY: &str = "https://api.mymemory.translated.net/get";

const MAX_DEFINITIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub types: Vec<String>,
    pub stats: Vec<(String, u32)>,
    /// Decimetres.
    pub height: u32,
    /// Hectograms.
    pub weight: u32,
    pub sprite: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anime {
    pub title: String,
    pub url: String,
    pub synopsis: Option<String>,
    pub score: Option<f64>,
    pub episodes: Option<u32>,
    pub status: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    pub area: String,
    pub temp_c: String,
    pub feels_like_c: String,
    pub humidity: String,
    pub description: String,
    pub wind_kmph: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub part_of_speech: String,
    pub definition: String,
    pub example: Option<String>,
}

#[derive(Clone, Default)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn pokemon(&self, name: &str) -> Result<Pokemon, BotError> {
        let slug = name.trim().to_lowercase().replace(' ', "-");
        let url = endpoint(POKEAPI, &["pokemon", &slug])?;
        let body = self.fetch("PokeAPI", url, &[]).await?;
        parse_pokemon(&body)
    }

    pub async fn species_names(&self) -> Result<Vec<String>, BotError> {
        let url = endpoint(POKEAPI, &["pokemon-species"])?;
        let body = self.fetch("PokeAPI", url, &[("limit", "2000")]).await?;
        parse_species_names(&body)
    }

    pub async fn anime(&self, query: &str) -> Result<Anime, BotError> {
        let url = endpoint(JIKAN, &["anime"])?;
        let body = self
            .fetch("Jikan", url, &[("q", query), ("limit", "1")])
            .await?;
        parse_anime(&body)?.ok_or_else(|| BotError::NotFound(format!("anime `{query}`")))
    }

    pub async fn weather(&self, city: &str) -> Result<Weather, BotError> {
        let url = endpoint(WTTR, &[city.trim()])?;
        let body = self.fetch("wttr.in", url, &[("format", "j1")]).await?;
        parse_weather(&body)?.ok_or_else(|| BotError::NotFound(format!("weather for `{city}`")))
    }

    pub async fn define(&self, word: &str) -> Result<Vec<Definition>, BotError> {
        let url = endpoint(DICTIONARY, &[word.trim()])?;
        let body = self.fetch("dictionaryapi.dev", url, &[]).await?;
        let definitions = parse_definitions(&body)?;
        if definitions.is_empty() {
            return Err(BotError::NotFound(format!("definition of `{word}`")));
        }
        Ok(definitions)
    }

    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, BotError> {
        let url = endpoint(MYMEMORY, &[])?;
        let langpair = format!("{from}|{to}");
        let body = self
            .fetch("MyMemory", url, &[("q", text), ("langpair", &langpair)])
            .await?;
        parse_translation(&body)
    }

    async fn fetch(
        &self,
        service: &'static str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<String, BotError> {
        tracing::debug!(service, %url, "api request");
        let response = self.http.get(url).query(query).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(BotError::NotFound(format!("{service} resource"))),
            status => Err(BotError::Api {
                service,
                status: status.as_u16(),
            }),
        }
    }
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, BotError> {
    let mut url = Url::parse(base).map_err(|e| BotError::Config(format!("bad url {base}: {e}")))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| BotError::Config(format!("{base} cannot take a path")))?
            .pop_if_empty()
            .extend(segments);
    }
    Ok(url)
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct RawPokemon {
    id: u32,
    name: String,
    height: u32,
    weight: u32,
    types: Vec<RawPokemonType>,
    stats: Vec<RawStat>,
    sprites: RawSprites,
}

#[derive(Deserialize)]
struct RawPokemonType {
    slot: u32,
    #[serde(rename = "type")]
    kind: Named,
}

#[derive(Deserialize)]
struct RawStat {
    base_stat: u32,
    stat: Named,
}

#[derive(Deserialize)]
struct RawSprites {
    front_default: Option<String>,
}

pub fn parse_pokemon(body: &str) -> Result<Pokemon, BotError> {
    let mut raw: RawPokemon = serde_json::from_str(body)?;
    raw.types.sort_by_key(|t| t.slot);

    Ok(Pokemon {
        id: raw.id,
        name: raw.name,
        types: raw.types.into_iter().map(|t| t.kind.name).collect(),
        stats: raw
            .stats
            .into_iter()
            .map(|s| (s.stat.name, s.base_stat))
            .collect(),
        height: raw.height,
        weight: raw.weight,
        sprite: raw.sprites.front_default,
    })
}

#[derive(Deserialize)]
struct RawSpeciesList {
    results: Vec<Named>,
}

pub fn parse_species_names(body: &str) -> Result<Vec<String>, BotError> {
    let raw: RawSpeciesList = serde_json::from_str(body)?;
    Ok(raw.results.into_iter().map(|n| n.name).collect())
}

#[derive(Deserialize)]
struct RawAnimeSearch {
    data: Vec<RawAnime>,
}

#[derive(Deserialize)]
struct RawAnime {
    title: String,
    url: String,
    synopsis: Option<String>,
    score: Option<f64>,
    episodes: Option<u32>,
    status: Option<String>,
    images: Option<RawAnimeImages>,
}

#[derive(Deserialize)]
struct RawAnimeImages {
    jpg: Option<RawImageUrl>,
}

#[derive(Deserialize)]
struct RawImageUrl {
    image_url: Option<String>,
}

pub fn parse_anime(body: &str) -> Result<Option<Anime>, BotError> {
    let raw: RawAnimeSearch = serde_json::from_str(body)?;
    Ok(raw.data.into_iter().next().map(|a| Anime {
        title: a.title,
        url: a.url,
        synopsis: a.synopsis,
        score: a.score,
        episodes: a.episodes,
        status: a.status,
        image: a.images.and_then(|i| i.jpg).and_then(|j| j.image_url),
    }))
}

#[derive(Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Deserialize)]
struct RawWeather {
    current_condition: Vec<RawCondition>,
    #[serde(default)]
    nearest_area: Vec<RawArea>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    humidity: String,
    windspeed_kmph: String,
    weather_desc: Vec<TextValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArea {
    area_name: Vec<TextValue>,
    #[serde(default)]
    country: Vec<TextValue>,
}

pub fn parse_weather(body: &str) -> Result<Option<Weather>, BotError> {
    let raw: RawWeather = serde_json::from_str(body)?;
    let Some(current) = raw.current_condition.into_iter().next() else {
        return Ok(None);
    };

    let area = raw
        .nearest_area
        .into_iter()
        .next()
        .map(|a| {
            let name = a.area_name.into_iter().next().map(|v| v.value);
            let country = a.country.into_iter().next().map(|v| v.value);
            match (name, country) {
                (Some(name), Some(country)) => format!("{name}, {country}"),
                (Some(name), None) => name,
                (None, Some(country)) => country,
                (None, None) => String::new(),
            }
        })
        .unwrap_or_default();

    Ok(Some(Weather {
        area,
        temp_c: current.temp_c,
        feels_like_c: current.feels_like_c,
        humidity: current.humidity,
        description: current
            .weather_desc
            .into_iter()
            .map(|v| v.value)
            .collect::<Vec<_>>()
            .join(", "),
        wind_kmph: current.windspeed_kmph,
    }))
}

#[derive(Deserialize)]
struct RawEntry {
    meanings: Vec<RawMeaning>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeaning {
    part_of_speech: String,
    definitions: Vec<RawDefinition>,
}

#[derive(Deserialize)]
struct RawDefinition {
    definition: String,
    example: Option<String>,
}

pub fn parse_definitions(body: &str) -> Result<Vec<Definition>, BotError> {
    let entries: Vec<RawEntry> = serde_json::from_str(body)?;

    Ok(entries
        .into_iter()
        .flat_map(|e| e.meanings)
        .flat_map(|m| {
            let part_of_speech = m.part_of_speech;
            m.definitions.into_iter().map(move |d| Definition {
                part_of_speech: part_of_speech.clone(),
                definition: d.definition,
                example: d.example,
            })
        })
        .take(MAX_DEFINITIONS)
        .collect())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTranslation {
    response_data: RawTranslatedText,
    response_status: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTranslatedText {
    translated_text: String,
}

pub fn parse_translation(body: &str) -> Result<String, BotError> {
    let raw: RawTranslation = serde_json::from_str(body)?;

    // MyMemory reports errors in the body with a 200 response
    let status = match &raw.response_status {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };
    match status {
        Some(200) => Ok(raw.response_data.translated_text),
        Some(code) => Err(BotError::Api {
            service: "MyMemory",
            status: u16::try_from(code).unwrap_or(u16::MAX),
        }),
        None => Err(BotError::Api {
            service: "MyMemory",
            status: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pokemon() {
        let body = r#"{
            "id": 6, "name": "charizard", "height": 17, "weight": 905,
            "types": [
                {"slot": 2, "type": {"name": "flying", "url": ""}},
                {"slot": 1, "type": {"name": "fire", "url": ""}}
            ],
            "stats": [
                {"base_stat": 78, "effort": 0, "stat": {"name": "hp", "url": ""}},
                {"base_stat": 84, "effort": 0, "stat": {"name": "attack", "url": ""}}
            ],
            "sprites": {"front_default": "https://img/6.png", "back_default": null}
        }"#;

        let pokemon = parse_pokemon(body).unwrap();
        assert_eq!(pokemon.id, 6);
        assert_eq!(pokemon.types, vec!["fire", "flying"]);
        assert_eq!(pokemon.stats[0], ("hp".to_owned(), 78));
        assert_eq!(pokemon.sprite.as_deref(), Some("https://img/6.png"));
    }

    #[test]
    fn parses_species_list() {
        let body = r#"{"count": 2, "next": null, "results": [
            {"name": "bulbasaur", "url": ""}, {"name": "ivysaur", "url": ""}
        ]}"#;
        assert_eq!(parse_species_names(body).unwrap(), vec!["bulbasaur", "ivysaur"]);
    }

    #[test]
    fn parses_first_anime_hit() {
        let body = r#"{"pagination": {}, "data": [{
            "title": "Cowboy Bebop", "url": "https://myanimelist.net/anime/1",
            "synopsis": "Space bounty hunters.", "score": 8.75, "episodes": 26,
            "status": "Finished Airing",
            "images": {"jpg": {"image_url": "https://cdn/1.jpg"}}
        }]}"#;

        let anime = parse_anime(body).unwrap().unwrap();
        assert_eq!(anime.title, "Cowboy Bebop");
        assert_eq!(anime.episodes, Some(26));
        assert_eq!(anime.image.as_deref(), Some("https://cdn/1.jpg"));

        assert_eq!(parse_anime(r#"{"data": []}"#).unwrap(), None);
    }

    #[test]
    fn parses_weather() {
        let body = r#"{
            "current_condition": [{
                "temp_C": "11", "FeelsLikeC": "9", "humidity": "87",
                "windspeedKmph": "15", "weatherDesc": [{"value": "Light rain"}]
            }],
            "nearest_area": [{
                "areaName": [{"value": "London"}], "country": [{"value": "United Kingdom"}]
            }]
        }"#;

        let weather = parse_weather(body).unwrap().unwrap();
        assert_eq!(weather.area, "London, United Kingdom");
        assert_eq!(weather.temp_c, "11");
        assert_eq!(weather.description, "Light rain");
        assert_eq!(weather.wind_kmph, "15");
    }

    #[test]
    fn definitions_are_capped() {
        let body = r#"[{"word": "run", "meanings": [
            {"partOfSpeech": "verb", "definitions": [
                {"definition": "move fast", "example": "run home"},
                {"definition": "operate"}
            ]},
            {"partOfSpeech": "noun", "definitions": [
                {"definition": "an act of running"},
                {"definition": "a sequence"}
            ]}
        ]}]"#;

        let defs = parse_definitions(body).unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].example.as_deref(), Some("run home"));
        assert_eq!(defs[2].part_of_speech, "noun");
    }

    #[test]
    fn translation_checks_body_status() {
        let ok = r#"{"responseData": {"translatedText": "Bonjour", "match": 1}, "responseStatus": 200}"#;
        assert_eq!(parse_translation(ok).unwrap(), "Bonjour");

        let bad = r#"{"responseData": {"translatedText": "INVALID LANGUAGE PAIR"}, "responseStatus": "403"}"#;
        assert!(matches!(
            parse_translation(bad),
            Err(BotError::Api { status: 403, .. })
        ));
    }

    #[test]
    fn endpoint_escapes_segments() {
        let url = endpoint(DICTIONARY, &["ice cream"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/ice%20cream"
        );
        let url = endpoint(POKEAPI, &["pokemon", "mr-mime"]).unwrap();
        assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/mr-mime");
    }
}
