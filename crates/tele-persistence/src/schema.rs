//! Esquema Diesel (escrito a mano, equivalente a `diesel print-schema`).

diesel::table! {
    raw_records (record_id) {
        record_id -> BigInt,
        source_channel -> Text,
        payload -> Jsonb,
        loaded_at -> Timestamptz,
    }
}

diesel::table! {
    derived_facts (record_id, fact_label) {
        record_id -> BigInt,
        fact_label -> Text,
        confidence -> Float8,
        detected_at -> Timestamptz,
    }
}

diesel::table! {
    pipeline_run_events (seq) {
        seq -> BigInt,
        run_id -> Uuid,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}

diesel::table! {
    stage_execution_errors (id) {
        id -> BigInt,
        run_id -> Uuid,
        stage_id -> Text,
        error_class -> Text,
        details -> Nullable<Jsonb>,
        ts -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    raw_records,
    derived_facts,
    pipeline_run_events,
    stage_execution_errors,
);
