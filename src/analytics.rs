//! Consultas de lectura sobre el raw store: términos más mencionados,
//! actividad diaria por canal y búsqueda por palabra clave.
//!
//! El texto de un mensaje sale del campo `message` (o `text`) del payload y
//! la fecha del campo `date` (RFC 3339).
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tele_domain::{RawRecord, RawStore, RecordId, StoreError};

const STOP_WORDS: &[&str] = &["the", "for", "and", "are", "with", "you", "this", "that", "from", "call", "have", "more",
                              "free", "price", "delivery", "contact", "order", "telegram", "channel", "available",
                              "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "until",
                              "adress", "school"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub mentions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub posts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelActivity {
    pub channel: String,
    pub total_posts: usize,
    /// Más reciente primero. Los mensajes sin fecha sólo cuentan en el total.
    pub daily: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageHit {
    pub record_id: RecordId,
    pub channel: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub text: String,
}

fn message_text(rec: &RawRecord) -> Option<&str> {
    rec.payload
       .get("message")
       .or_else(|| rec.payload.get("text"))
       .and_then(|v| v.as_str())
}

fn posted_at(rec: &RawRecord) -> Option<DateTime<Utc>> {
    let raw = rec.payload.get("date")?.as_str()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|d| d.with_timezone(&Utc))
}

/// Normaliza un token: sólo letras ASCII, en minúsculas. `None` si queda
/// corto o es una stop word.
fn normalize_term(token: &str) -> Option<String> {
    let term: String = token.chars()
                            .filter(char::is_ascii_alphabetic)
                            .map(|c| c.to_ascii_lowercase())
                            .collect();
    (term.len() > 3 && !STOP_WORDS.contains(&term.as_str())).then_some(term)
}

/// Términos más mencionados en todos los mensajes (empates por orden
/// alfabético).
pub fn top_terms(store: &dyn RawStore, limit: usize) -> Result<Vec<TermCount>, StoreError> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for rec in store.records()? {
        let Some(text) = message_text(&rec) else { continue };
        for term in text.split_whitespace().filter_map(normalize_term) {
            *counts.entry(term).or_default() += 1;
        }
    }
    let mut terms: Vec<TermCount> = counts.into_iter()
                                          .map(|(term, mentions)| TermCount { term, mentions })
                                          .collect();
    terms.sort_by(|a, b| b.mentions.cmp(&a.mentions).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(limit);
    Ok(terms)
}

/// `None` si el canal no tiene ningún registro.
pub fn channel_activity(store: &dyn RawStore, channel: &str) -> Result<Option<ChannelActivity>, StoreError> {
    let records: Vec<RawRecord> = store.records()?.into_iter().filter(|r| r.source_channel == channel).collect();
    if records.is_empty() {
        return Ok(None);
    }
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for rec in &records {
        if let Some(ts) = posted_at(rec) {
            *per_day.entry(ts.date_naive()).or_default() += 1;
        }
    }
    Ok(Some(ChannelActivity { channel: channel.to_string(),
                              total_posts: records.len(),
                              daily: per_day.into_iter()
                                            .rev()
                                            .map(|(date, posts)| DailyCount { date, posts })
                                            .collect() }))
}

/// Mensajes que contienen `keyword` (sin distinguir mayúsculas), más
/// recientes primero; los que no tienen fecha van al final.
pub fn search_messages(store: &dyn RawStore, keyword: &str, limit: usize) -> Result<Vec<MessageHit>, StoreError> {
    let needle = keyword.to_lowercase();
    let mut hits: Vec<MessageHit> = store.records()?
                                         .iter()
                                         .filter_map(|rec| {
                                             let text = message_text(rec)?;
                                             text.to_lowercase().contains(&needle).then(|| MessageHit {
                                                 record_id: rec.record_id,
                                                 channel: rec.source_channel.clone(),
                                                 posted_at: posted_at(rec),
                                                 text: text.to_string(),
                                             })
                                         })
                                         .collect();
    hits.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| b.record_id.cmp(&a.record_id)));
    hits.truncate(limit);
    Ok(hits)
}
