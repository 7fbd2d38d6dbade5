// Generated by hand to mirror `migrations/2024-01-01-000000_init`; kept in
// sync manually rather than via `diesel print-schema` since the workspace
// never invokes the diesel CLI as part of its build.

diesel::table! {
    parked_pieces (id) {
        id -> Int8,
        piece_cid -> Text,
        piece_padded_size -> Int8,
        piece_raw_size -> Int8,
        long_term -> Bool,
        complete -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    parked_piece_refs (ref_id) {
        ref_id -> Int8,
        piece_id -> Int8,
        data_url -> Text,
        long_term -> Bool,
        data_headers -> Jsonb,
    }
}

diesel::table! {
    pdp_piece_refs (id) {
        id -> Int8,
        service -> Text,
        piece_cid -> Text,
        piece_ref -> Int8,
    }
}

diesel::table! {
    pdp_piece_mh_to_commp (mhash, size) {
        mhash -> Text,
        size -> Int8,
        commp -> Text,
    }
}

diesel::table! {
    pdp_piece_uploads (id) {
        id -> Uuid,
        service -> Text,
        piece_cid -> Nullable<Text>,
        notify_url -> Nullable<Text>,
        check_hash_codec -> Text,
        check_hash -> Text,
        check_size -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pdp_proof_sets (id) {
        id -> Int8,
        service -> Text,
        init_ready -> Bool,
        prove_at_epoch -> Nullable<Int8>,
        prev_challenge_request_epoch -> Nullable<Int8>,
        proving_period -> Nullable<Int8>,
        challenge_window -> Nullable<Int8>,
        challenge_request_msg_hash -> Nullable<Text>,
        create_message_hash -> Text,
    }
}

diesel::table! {
    pdp_proofset_roots (id) {
        id -> Int8,
        proofset_id -> Int8,
        root_id -> Int8,
        root_cid -> Text,
        subroot_cid -> Text,
        subroot_offset -> Int8,
        subroot_size -> Int8,
        piece_ref_id -> Int8,
    }
}

diesel::table! {
    pdp_proofset_root_adds (id) {
        id -> Int8,
        proofset_id -> Int8,
        root_id -> Int8,
        root_cid -> Text,
        subroot_cid -> Text,
        subroot_offset -> Int8,
        subroot_size -> Int8,
        piece_ref_id -> Int8,
        add_message_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    message_waits_eth (signed_tx_hash) {
        signed_tx_hash -> Text,
        tx_status -> Text,
        tx_success -> Nullable<Bool>,
        tx_receipt -> Nullable<Jsonb>,
        confirmed_block_number -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pdp_proofset_creates (signed_tx_hash) {
        signed_tx_hash -> Text,
        service -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    pdp_provider_registrations (signed_tx_hash) {
        signed_tx_hash -> Text,
        address -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Int8,
        name -> Text,
        posted_at -> Timestamptz,
        initiated_at -> Nullable<Timestamptz>,
        leased_by_session -> Nullable<Text>,
        lease_expires_at -> Nullable<Timestamptz>,
        update_time -> Timestamptz,
        retries -> Int4,
        payload -> Bytea,
    }
}

diesel::table! {
    task_history (id) {
        id -> Int8,
        task_id -> Int8,
        name -> Text,
        posted -> Timestamptz,
        work_start -> Nullable<Timestamptz>,
        work_end -> Nullable<Timestamptz>,
        result -> Nullable<Bool>,
        err -> Nullable<Text>,
        completed_by_session_id -> Nullable<Text>,
    }
}

diesel::table! {
    dead_letter_tasks (id) {
        id -> Int8,
        name -> Text,
        payload -> Bytea,
        retries -> Int4,
        last_err -> Nullable<Text>,
        moved_at -> Timestamptz,
    }
}

diesel::joinable!(parked_piece_refs -> parked_pieces (piece_id));
diesel::joinable!(pdp_piece_refs -> parked_piece_refs (piece_ref));
diesel::joinable!(pdp_proofset_roots -> pdp_proof_sets (proofset_id));
diesel::joinable!(pdp_proofset_roots -> parked_piece_refs (piece_ref_id));
diesel::joinable!(pdp_proofset_root_adds -> pdp_proof_sets (proofset_id));
diesel::joinable!(pdp_proofset_root_adds -> parked_piece_refs (piece_ref_id));
diesel::joinable!(pdp_proofset_creates -> message_waits_eth (signed_tx_hash));
diesel::joinable!(pdp_provider_registrations -> message_waits_eth (signed_tx_hash));

diesel::allow_tables_to_appear_in_same_query!(
    parked_pieces,
    parked_piece_refs,
    pdp_piece_refs,
    pdp_piece_mh_to_commp,
    pdp_piece_uploads,
    pdp_proof_sets,
    pdp_proofset_roots,
    pdp_proofset_root_adds,
    message_waits_eth,
    pdp_proofset_creates,
    pdp_provider_registrations,
    tasks,
    task_history,
    dead_letter_tasks,
);
