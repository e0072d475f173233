pub mod license_keys;
