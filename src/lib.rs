pub mod shared {
    pub mod core {
        pub mod primitives;
        pub mod timestamps;
    }
    pub mod infrastructure {
        pub mod event_bus;
        pub mod retry;
    }
}

pub mod modules {
    pub mod commits_sync {
        pub mod core {
            pub mod commit;
            pub mod events;
            pub mod fetch_window;
            pub mod intent;
            pub mod reconcile;
            pub mod watermark;
        }
        pub mod use_cases {
            pub mod errors;
            pub mod manage_intents {
                pub mod handler;
                pub mod inbound {
                    pub mod graphql;
                    pub mod http;
                }
            }
            pub mod reconcile_watermark {
                pub mod handler;
            }
            pub mod register_intent {
                pub mod handler;
                pub mod inbound {
                    pub mod graphql;
                    pub mod http;
                }
            }
            pub mod sync_repository {
                pub mod handler;
            }
        }
        pub mod adapters {
            pub mod outbound {
                pub mod commit_source;
                pub mod commit_source_github;
                pub mod commit_source_in_memory;
                pub mod intent_registry;
                pub mod intent_registry_in_memory;
                pub mod watermark_store;
                pub mod watermark_store_in_memory;
                pub mod watermark_store_json_file;
            }
        }
        pub mod workers {
            pub mod intent_processor;
            pub mod periodic_sweep;
            pub mod repository_locks;
        }
    }
    pub mod commit_history {
        pub mod core {
            pub mod aggregation;
        }
        pub mod use_cases {
            pub mod store_sync_events {
                pub mod handler;
            }
            pub mod query_commit_history {
                pub mod inbound {
                    pub mod graphql;
                    pub mod http;
                }
            }
        }
        pub mod adapters {
            pub mod outbound {
                pub mod commit_store;
                pub mod commit_store_in_memory;
            }
        }
    }
}

pub mod shell;
