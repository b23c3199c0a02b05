//! End-to-end KCV scenarios: the surface the graph host drives

use std::sync::Arc;
use trellis::{
    CcMode, Engine, EngineConfig, Error, StorageScheme, StoreManager, StoreTransaction,
    TransactionConfig,
};

fn manager(mode: CcMode, scheme: StorageScheme) -> StoreManager {
    let engine = Arc::new(Engine::new(EngineConfig::with_mode(mode)));
    StoreManager::with_engine(engine, scheme)
}

#[test]
fn adapter_parity_between_schemes() {
    // Same row, same cells, both schemes: identical ascending output.
    for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
        let manager = manager(CcMode::TwoPhase, scheme);
        let store = manager.open_store("vertexstore").unwrap();

        let tx = manager
            .begin_transaction(TransactionConfig::default())
            .unwrap();
        store
            .mutate(
                b"v:1",
                &[
                    (b"name".to_vec(), b"Alice".to_vec()),
                    (b"age".to_vec(), b"30".to_vec()),
                    (b"city".to_vec(), b"NYC".to_vec()),
                ],
                &[],
                &tx,
            )
            .unwrap();
        manager.commit(tx).unwrap();

        let read = StoreTransaction::one_shot();
        let all = store
            .get_slice(b"v:1", b"", b"", usize::MAX, &read)
            .unwrap();
        assert_eq!(
            all,
            vec![
                (b"age".to_vec(), b"30".to_vec()),
                (b"city".to_vec(), b"NYC".to_vec()),
                (b"name".to_vec(), b"Alice".to_vec()),
            ],
            "scheme {scheme}"
        );
    }
}

#[test]
fn slice_bounds_are_start_inclusive_end_exclusive() {
    for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
        let manager = manager(CcMode::Serial, scheme);
        let store = manager.open_store("s").unwrap();
        let tx = StoreTransaction::one_shot();

        store
            .mutate(
                b"r",
                &[
                    (b"a".to_vec(), b"1".to_vec()),
                    (b"b".to_vec(), b"2".to_vec()),
                    (b"c".to_vec(), b"3".to_vec()),
                ],
                &[],
                &tx,
            )
            .unwrap();

        let slice = store.get_slice(b"r", b"a", b"c", 10, &tx).unwrap();
        let cols: Vec<_> = slice.iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(cols, vec![b"a".to_vec(), b"b".to_vec()], "scheme {scheme}");
    }
}

#[test]
fn zero_byte_and_empty_operands_rejected() {
    let manager = manager(CcMode::TwoPhase, StorageScheme::CompositeKey);
    let store = manager.open_store("s").unwrap();
    let tx = StoreTransaction::one_shot();

    assert!(matches!(
        store.get(b"row\x00bad", b"c", &tx),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(
        store.get(b"r", b"col\x00bad", &tx),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(
        store.get(b"", b"c", &tx),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn transactional_visibility_through_store() {
    let manager = manager(CcMode::Optimistic, StorageScheme::CompositeKey);
    let store = manager.open_store("s").unwrap();

    let tx = manager
        .begin_transaction(TransactionConfig::default())
        .unwrap();
    store
        .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
        .unwrap();

    // Visible inside the transaction, invisible outside before commit.
    assert_eq!(store.get(b"r", b"c", &tx).unwrap(), b"v");
    let outside = StoreTransaction::one_shot();
    assert!(matches!(
        store.get(b"r", b"c", &outside),
        Err(Error::KeyNotFound)
    ));

    manager.commit(tx).unwrap();
    assert_eq!(store.get(b"r", b"c", &outside).unwrap(), b"v");
}

#[test]
fn rollback_through_store() {
    let manager = manager(CcMode::TwoPhase, StorageScheme::SerializedColumns);
    let store = manager.open_store("s").unwrap();

    let tx = manager
        .begin_transaction(TransactionConfig::default())
        .unwrap();
    store
        .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
        .unwrap();
    manager.rollback(tx).unwrap();

    assert!(!store
        .contains_key(b"r", &StoreTransaction::one_shot())
        .unwrap());
}

#[test]
fn get_keys_enumerates_rows_in_order() {
    for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
        let manager = manager(CcMode::Serial, scheme);
        let store = manager.open_store("s").unwrap();
        let tx = StoreTransaction::one_shot();

        for row in [&b"e:3"[..], b"e:1", b"e:2"] {
            store
                .mutate(row, &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
                .unwrap();
        }

        let rows = store
            .get_keys(b"e:", b"e:\xff", b"", b"", usize::MAX, &tx)
            .unwrap();
        assert_eq!(
            rows,
            vec![b"e:1".to_vec(), b"e:2".to_vec(), b"e:3".to_vec()],
            "scheme {scheme}"
        );
    }
}

#[test]
fn conflicting_store_transactions_2pl() {
    let manager = manager(CcMode::TwoPhase, StorageScheme::CompositeKey);
    let store = manager.open_store("s").unwrap();

    let seed = manager
        .begin_transaction(TransactionConfig::default())
        .unwrap();
    store
        .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &seed)
        .unwrap();
    manager.commit(seed).unwrap();

    let tx1 = manager
        .begin_transaction(TransactionConfig::default())
        .unwrap();
    store.get(b"r", b"c", &tx1).unwrap();

    let tx2 = manager
        .begin_transaction(TransactionConfig::default())
        .unwrap();
    let err = store
        .mutate(b"r", &[(b"c".to_vec(), b"w".to_vec())], &[], &tx2)
        .unwrap_err();
    assert!(err.is_conflict());
    manager.rollback(tx2).unwrap();
    manager.commit(tx1).unwrap();
}

#[test]
fn serialized_scheme_works_on_hash_table() {
    // Point reads and packed-row mutation never scan, so a hash table is
    // a legal backing for the serialized scheme even under OCC.
    let engine = Arc::new(Engine::new(EngineConfig::with_mode(CcMode::Optimistic)));
    engine
        .create_table("props", trellis::PartitionMethod::Hash)
        .unwrap();
    let adapter = trellis::ColumnAdapter::new(
        Arc::clone(&engine),
        "props",
        StorageScheme::SerializedColumns,
    );

    let tx = engine.begin_transaction().unwrap();
    adapter.set_column(tx, b"v:1", b"name", b"Alice").unwrap();
    adapter.set_column(tx, b"v:1", b"age", b"30").unwrap();
    adapter.set_column(tx, b"v:1", b"city", b"NYC").unwrap();
    engine.commit(tx).unwrap();

    let all = adapter.get_all_columns(0, b"v:1").unwrap();
    assert_eq!(
        all,
        vec![
            (b"age".to_vec(), b"30".to_vec()),
            (b"city".to_vec(), b"NYC".to_vec()),
            (b"name".to_vec(), b"Alice".to_vec()),
        ]
    );
}
