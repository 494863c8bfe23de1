// Log hygiene: scans every source file for tracing calls that carry medication
// names, symptom text or message bodies. Logs may hold opaque ids, reason
// keys and counts only.
