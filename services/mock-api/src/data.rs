//! Static mock payloads for the bearer-protected resource routes
//!
//! The platform's groups, document repositories, and learning rooms are
//! canned data here; the mock backend persists nothing.

use serde_json::{Value, json};

/// Study groups the seeded student belongs to.
pub fn groups() -> Value {
    json!({
        "groups": [
            {
                "id": "grp_algebra",
                "name": "Linear Algebra Study Group",
                "members": 14,
                "forumThreads": 23
            },
            {
                "id": "grp_compilers",
                "name": "Compiler Construction",
                "members": 8,
                "forumThreads": 41
            },
            {
                "id": "grp_writing",
                "name": "Academic Writing Workshop",
                "members": 21,
                "forumThreads": 9
            }
        ]
    })
}

/// Document repositories visible to the seeded student.
pub fn repositories() -> Value {
    json!({
        "repositories": [
            {
                "id": "repo_lectures",
                "name": "Lecture Notes",
                "documents": 112,
                "lastUpdated": "2026-08-21"
            },
            {
                "id": "repo_pastexams",
                "name": "Past Exams",
                "documents": 36,
                "lastUpdated": "2026-06-30"
            }
        ]
    })
}

/// Gamified learning rooms.
pub fn rooms() -> Value {
    json!({
        "rooms": [
            {
                "id": "room_matrices",
                "title": "Matrix Mayhem",
                "topic": "linear-algebra",
                "level": 3,
                "players": 5
            },
            {
                "id": "room_parsing",
                "title": "Parser Panic",
                "topic": "compilers",
                "level": 2,
                "players": 2
            },
            {
                "id": "room_citations",
                "title": "Citation Sprint",
                "topic": "writing",
                "level": 1,
                "players": 7
            }
        ]
    })
}
