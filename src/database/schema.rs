// Matches the layout of existing software.db files on the drive.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS software (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        filename TEXT NOT NULL,
        path TEXT UNIQUE NOT NULL,
        description TEXT DEFAULT '',
        last_used TEXT,
        use_count INTEGER DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        name TEXT UNIQUE NOT NULL
    );

    CREATE TABLE IF NOT EXISTS software_tags (
        software_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        PRIMARY KEY (software_id, tag_id),
        FOREIGN KEY (software_id) REFERENCES software(id),
        FOREIGN KEY (tag_id) REFERENCES tags(id)
    );
";

/// Tags seeded the first time a database file is created.
pub const DEFAULT_TAGS: &[&str] = &[
    "Essentials",
    "Drivers",
    "Office",
    "Browser",
    "Tools",
    "Security",
    "System",
];

/// `last_used` format: local time, ISO-8601, no offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
