pub mod shared {
    pub mod infrastructure {
        pub mod tournament_store;
    }
}

pub mod modules {
    pub mod tournaments {
        pub mod core {
            pub mod registration;
            pub mod tournament;
        }
        pub mod use_cases {
            pub mod register_player {
                pub mod command;
                pub mod decide;
                pub mod decision;
                pub mod handler;
                pub mod retry_policy;
            }
        }
    }
}

pub mod shell;
