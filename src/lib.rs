pub mod cache;
pub mod collect;
pub mod compression;
pub mod core;
pub mod documents;
pub mod postings;
pub mod query;
pub mod scoring;
pub mod search;
pub mod storage;
pub mod trie;

/*
┌──────────────────────────── READ PATH ─────────────────────────────┐
│                                                                     │
│  query tree ──> Searcher ──per segment──> Collector                 │
│                    │                         │  expand (trie)       │
│                    │                         │  scan (postings)     │
│                    │                         │  resolve (union/max) │
│                    │                                                │
│                    ├──> Reducer (version precedence) ──> ranking    │
│                    │                                                │
│                    └──> page ──group by segment──> DocContainer     │
│                                                                     │
│  SegmentCatalog ──> SegmentDescriptor (<v>.ix)                      │
│  Trie            (<v>-<field>.tc)    exact / prefix / fuzzy         │
│  ShardHandle     (<v>-<shard>.tdm)   term -> postings               │
│  DocContainer    (<v>.dtbl)          blocks + key index + presence  │
│  SegmentCaches   load-once cache of opened containers               │
│                                                                     │
└─────────────────────────────────────────────────────────────────────┘
*/
