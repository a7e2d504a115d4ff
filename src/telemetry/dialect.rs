//! Placeholder and cast differences between the supported tracking databases.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once("://")?.0.to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            _ => None,
        }
    }

    /// Placeholder for the 1-based bind position `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql => "?".to_string(),
        }
    }

    /// Comma-separated placeholders for `count` binds starting at position `start`.
    pub fn placeholders(self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Integer columns are widened so both drivers decode them as i64.
    pub fn bigint(self, column: &str) -> String {
        match self {
            Dialect::Postgres => format!("{column}::bigint"),
            Dialect::MySql => format!("CAST({column} AS SIGNED)"),
        }
    }

    fn position_columns(self) -> String {
        format!(
            "{id} AS id, {device} AS device_id, p.protocol AS protocol, \
             p.fixtime AS fix_time, p.servertime AS server_time, p.devicetime AS device_time, \
             p.latitude AS latitude, p.longitude AS longitude, p.speed AS speed, \
             p.course AS course, p.address AS address, p.attributes AS attributes",
            id = self.bigint("p.id"),
            device = self.bigint("p.deviceid"),
        )
    }

    /// Latest position per device, via the device's `positionid` pointer.
    pub fn latest_positions_sql(self, device_count: usize) -> String {
        format!(
            "SELECT {columns} FROM tc_devices d \
             JOIN tc_positions p ON p.id = d.positionid \
             WHERE d.id IN ({ids})",
            columns = self.position_columns(),
            ids = self.placeholders(1, device_count),
        )
    }

    pub fn positions_sql(self) -> String {
        format!(
            "SELECT {columns} FROM tc_positions p \
             WHERE p.deviceid = {device} AND p.fixtime BETWEEN {from} AND {to} \
             ORDER BY p.fixtime ASC, p.id ASC",
            columns = self.position_columns(),
            device = self.placeholder(1),
            from = self.placeholder(2),
            to = self.placeholder(3),
        )
    }

    pub fn events_sql(self, device_count: usize) -> String {
        let next = device_count + 1;
        format!(
            "SELECT {id} AS id, e.type AS event_type, e.eventtime AS event_time, \
             {device} AS device_id, {position} AS position_id, {geofence} AS geofence_id, \
             e.attributes AS attributes \
             FROM tc_events e \
             WHERE e.deviceid IN ({ids}) AND e.eventtime BETWEEN {from} AND {to} \
             ORDER BY e.eventtime DESC, e.id DESC \
             LIMIT {limit}",
            id = self.bigint("e.id"),
            device = self.bigint("e.deviceid"),
            position = self.bigint("e.positionid"),
            geofence = self.bigint("e.geofenceid"),
            ids = self.placeholders(1, device_count),
            from = self.placeholder(next),
            to = self.placeholder(next + 1),
            limit = self.placeholder(next + 2),
        )
    }
}
