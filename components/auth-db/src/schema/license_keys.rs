table! {
    license_keys (id) {
        id -> BigInt,
        key_value -> Text,
        machine_id -> Nullable<Text>,
        expires_at -> Timestamp,
        created_at -> Nullable<Timestamptz>,
    }
}
