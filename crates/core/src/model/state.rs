//! State identifiers as assigned by the remote service.

/// `(state_id, abbreviation, name)`, mirrored by the `ls_state` seed rows.
pub const STATES: [(i64, &str, &str); 52] = [
    (1, "AL", "Alabama"),
    (2, "AK", "Alaska"),
    (3, "AZ", "Arizona"),
    (4, "AR", "Arkansas"),
    (5, "CA", "California"),
    (6, "CO", "Colorado"),
    (7, "CT", "Connecticut"),
    (8, "DE", "Delaware"),
    (9, "FL", "Florida"),
    (10, "GA", "Georgia"),
    (11, "HI", "Hawaii"),
    (12, "ID", "Idaho"),
    (13, "IL", "Illinois"),
    (14, "IN", "Indiana"),
    (15, "IA", "Iowa"),
    (16, "KS", "Kansas"),
    (17, "KY", "Kentucky"),
    (18, "LA", "Louisiana"),
    (19, "ME", "Maine"),
    (20, "MD", "Maryland"),
    (21, "MA", "Massachusetts"),
    (22, "MI", "Michigan"),
    (23, "MN", "Minnesota"),
    (24, "MS", "Mississippi"),
    (25, "MO", "Missouri"),
    (26, "MT", "Montana"),
    (27, "NE", "Nebraska"),
    (28, "NV", "Nevada"),
    (29, "NH", "New Hampshire"),
    (30, "NJ", "New Jersey"),
    (31, "NM", "New Mexico"),
    (32, "NY", "New York"),
    (33, "NC", "North Carolina"),
    (34, "ND", "North Dakota"),
    (35, "OH", "Ohio"),
    (36, "OK", "Oklahoma"),
    (37, "OR", "Oregon"),
    (38, "PA", "Pennsylvania"),
    (39, "RI", "Rhode Island"),
    (40, "SC", "South Carolina"),
    (41, "SD", "South Dakota"),
    (42, "TN", "Tennessee"),
    (43, "TX", "Texas"),
    (44, "UT", "Utah"),
    (45, "VT", "Vermont"),
    (46, "VA", "Virginia"),
    (47, "WA", "Washington"),
    (48, "WV", "West Virginia"),
    (49, "WI", "Wisconsin"),
    (50, "WY", "Wyoming"),
    (51, "DC", "Washington D.C."),
    (52, "US", "US Congress"),
];

/// Look up a state id by abbreviation, case-insensitively.
pub fn state_id(abbr: &str) -> Option<i64> {
    STATES
        .iter()
        .find(|(_, a, _)| a.eq_ignore_ascii_case(abbr.trim()))
        .map(|(id, _, _)| *id)
}

/// Look up a state abbreviation by id.
pub fn state_abbr(id: i64) -> Option<&'static str> {
    STATES.iter().find(|(i, _, _)| *i == id).map(|(_, a, _)| *a)
}
