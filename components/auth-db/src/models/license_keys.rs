use super::db_id_format;
use chrono::NaiveDateTime;
use diesel::{self,
             pg::PgConnection,
             result::QueryResult,
             ExpressionMethods,
             OptionalExtension,
             QueryDsl,
             RunQueryDsl};

use crate::{auth_core::metrics::CounterMetric,
            metrics::Counter,
            schema::license_keys::license_keys};

#[derive(Debug, Identifiable, Serialize, Queryable)]
#[diesel(table_name = license_keys)]
pub struct LicenseKey {
    #[serde(with = "db_id_format")]
    pub id:         i64,
    pub key_value:  String,
    pub machine_id: Option<String>,
    pub expires_at: NaiveDateTime,
    pub created_at: Option<NaiveDateTime>,
}

impl LicenseKey {
    pub fn get_by_key(key: &str, conn: &mut PgConnection) -> QueryResult<Option<LicenseKey>> {
        Counter::DBCall.increment();

        license_keys::table.filter(license_keys::key_value.eq(key))
                           .first::<LicenseKey>(conn)
                           .optional()
    }

    pub fn get_by_machine_id(machine_id: &str,
                             conn: &mut PgConnection)
                             -> QueryResult<Option<LicenseKey>> {
        Counter::DBCall.increment();

        license_keys::table.filter(license_keys::machine_id.eq(machine_id))
                           .first::<LicenseKey>(conn)
                           .optional()
    }

    /// Bind a key to a machine. Conditional on the binding still being
    /// unset, so two concurrent activations of the same key cannot both
    /// win; 0 rows means another request took the binding first.
    pub fn bind_machine(key: &str,
                        machine_id: &str,
                        conn: &mut PgConnection)
                        -> QueryResult<usize> {
        Counter::DBCall.increment();

        diesel::update(license_keys::table.filter(license_keys::key_value.eq(key))
                                          .filter(license_keys::machine_id.is_null()))
            .set(license_keys::machine_id.eq(machine_id))
            .execute(conn)
    }
}
