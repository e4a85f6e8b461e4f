// End-to-end flows with real Groth16 proofs
mod common;

use ark_bn254::Fr;
use common::{groth16, test_config, Fixture, TEST_LEVELS};
use ed25519_dalek::SigningKey;
use shielded_pool::*;

fn groth16_fixture() -> Fixture {
    Fixture::new(test_config(TEST_LEVELS, 100), groth16())
}

#[test]
fn test_deposit_then_partial_withdrawal() {
    let mut fx = groth16_fixture();
    let alice = Keypair::generate();
    let recipient = Address::from_hex("0xDeaD00000000000000000000000000000000BEEf").unwrap();

    let deposit = fx.deposit(Note::new(100, alice.public_key()));
    assert_eq!(deposit.index, Some(0));
    assert_eq!(fx.pool.pool_balance(), 100);
    assert_eq!(fx.pool.tree().len(), 2);

    let change = Note::new(20, alice.public_key());
    let prepared = fx.prepare(
        TransactionRequest::new()
            .spend(deposit.clone(), &alice)
            .output(change.clone())
            .recipient(recipient),
    );
    assert_eq!(prepared.transaction.ext_data.ext_amount, -80);

    let applied = fx.pool.transact(prepared.transaction.clone()).unwrap();
    assert_eq!(applied.sequence, 1);
    assert_eq!(applied.first_index, 2);
    assert_eq!(prepared.placed_outputs(applied.first_index)[0], change);
    assert_eq!(fx.pool.tree().index_of(&change.commitment()), Some(2));

    assert_eq!(fx.balance(&recipient), 80);
    assert_eq!(fx.pool.pool_balance(), 20);
    assert!(fx.pool.is_spent(&deposit.nullifier(&alice).unwrap()));
    assert!(applied.unwrap.is_none());

    println!("✅ Deposit of 100 and withdrawal of 80 settled, 20 remains shielded");
}

#[test]
fn test_shielded_transfer_and_remote_withdrawal() {
    let mut fx = groth16_fixture();
    let signing_key = SigningKey::from_bytes(&[7u8; 32]);
    fx.pool.bridge_mut().set_signing_key(signing_key.clone());

    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let bob_account = Address::from_label("bob");
    let alice_remote = Address::from_label("alice-l1");

    let deposit = fx.deposit(Note::new(130, alice.public_key()));

    // Alice pays Bob 60 inside the pool and keeps 70
    let prepared = fx.prepare(
        TransactionRequest::new()
            .spend(deposit, &alice)
            .output(Note::new(60, bob.public_key()))
            .output(Note::new(70, alice.public_key())),
    );
    assert_eq!(prepared.transaction.ext_data.ext_amount, 0);
    let applied = fx.pool.transact(prepared.transaction.clone()).unwrap();
    let [bob_note, alice_change] = prepared.placed_outputs(applied.first_index);
    assert_eq!(fx.pool.pool_balance(), 130);

    // Bob withdraws locally
    let prepared = fx.prepare(TransactionRequest::new().spend(bob_note, &bob).recipient(bob_account));
    fx.pool.transact(prepared.transaction).unwrap();
    assert_eq!(fx.balance(&bob_account), 60);
    assert_eq!(fx.pool.pool_balance(), 70);

    // Alice releases her change on the remote domain
    let prepared = fx.prepare(
        TransactionRequest::new()
            .spend(alice_change, &alice)
            .recipient(alice_remote)
            .l1_withdrawal(1),
    );
    let applied = fx.pool.transact(prepared.transaction).unwrap();

    assert_eq!(fx.pool.pool_balance(), 0);
    assert_eq!(fx.balance(&fx.escrow()), 70);
    assert_eq!(fx.balance(&alice_remote), 0);

    let unwrap = applied.unwrap.expect("unwrap instruction");
    assert_eq!(unwrap.recipient, alice_remote);
    assert_eq!(unwrap.amount, 70);
    assert_eq!(unwrap.l1_fee, 1);
    assert_eq!(unwrap.id, applied.id);

    let outbox = fx.pool.bridge_mut().drain_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].instruction, unwrap);
    assert!(outbox[0].verify(&signing_key.verifying_key()));
    assert_eq!(fx.pool.bridge().pending(), 0);

    println!("✅ Shielded transfer, local withdrawal and remote withdrawal settled");
}

#[test]
fn test_proof_binds_recipient() {
    let mut fx = groth16_fixture();
    let alice = Keypair::generate();
    let recipient = Address::from_label("recipient");
    let attacker = Address::from_label("attacker");

    let deposit = fx.deposit(Note::new(50, alice.public_key()));
    let prepared = fx.prepare(TransactionRequest::new().spend(deposit, &alice).recipient(recipient));

    let mut tampered = prepared.transaction.clone();
    tampered.ext_data.recipient = attacker;
    let root = fx.pool.root();
    assert_eq!(fx.pool.transact(tampered), Err(PoolError::InvalidProof));
    assert_eq!(fx.pool.root(), root);
    assert_eq!(fx.balance(&attacker), 0);

    let mut tampered = prepared.transaction.clone();
    tampered.ext_data.relayer = attacker;
    assert_eq!(fx.pool.transact(tampered), Err(PoolError::InvalidProof));

    fx.pool.transact(prepared.transaction).unwrap();
    assert_eq!(fx.balance(&recipient), 50);

    println!("✅ Proof rejects substituted recipient and relayer");
}

#[test]
fn test_sixteen_input_withdrawal_with_real_proof() {
    let mut fx = groth16_fixture();
    let alice = Keypair::generate();
    let recipient = Address::from_label("recipient");

    let notes: Vec<Note> = [10, 20, 30]
        .into_iter()
        .map(|amount| fx.deposit(Note::new(amount, alice.public_key())))
        .collect();
    assert_eq!(fx.pool.pool_balance(), 60);

    let mut request = TransactionRequest::new()
        .output(Note::new(45, alice.public_key()))
        .recipient(recipient);
    for note in &notes {
        request = request.spend(note.clone(), &alice);
    }
    let prepared = fx.prepare(request);
    assert_eq!(prepared.transaction.arity(), Arity::Large);
    assert_eq!(prepared.transaction.ext_data.ext_amount, -15);

    let applied = fx.pool.transact(prepared.transaction).unwrap();
    assert_eq!(applied.sequence, 3);
    assert_eq!(fx.balance(&recipient), 15);
    assert_eq!(fx.pool.pool_balance(), 45);
    for note in &notes {
        assert!(fx.pool.is_spent(&note.nullifier(&alice).unwrap()));
    }

    println!("✅ Sixteen-input withdrawal proven and verified with Groth16");
}

#[test]
fn test_two_input_proof_rejected_as_sixteen_input() {
    let mut fx = groth16_fixture();
    let alice = Keypair::generate();
    let recipient = Address::from_label("recipient");

    let deposit = fx.deposit(Note::new(40, alice.public_key()));
    let prepared = fx.prepare(TransactionRequest::new().spend(deposit.clone(), &alice).recipient(recipient));
    assert_eq!(prepared.transaction.arity(), Arity::Small);

    // Same proof, public inputs reshaped for the sixteen-input circuit
    let mut reshaped = prepared.transaction.clone();
    let mut nullifiers = reshaped.input_nullifiers.as_slice().to_vec();
    nullifiers.extend((0..14u64).map(|i| Nullifier(Fr::from(1_000 + i))));
    reshaped.input_nullifiers = InputNullifiers::from_vec(nullifiers).unwrap();
    assert_eq!(reshaped.arity(), Arity::Large);

    let root = fx.pool.root();
    assert_eq!(fx.pool.transact(reshaped), Err(PoolError::InvalidProof));
    assert_eq!(fx.pool.root(), root);
    assert_eq!(fx.balance(&recipient), 0);
    assert!(!fx.pool.is_spent(&deposit.nullifier(&alice).unwrap()));

    fx.pool.transact(prepared.transaction).unwrap();
    assert_eq!(fx.balance(&recipient), 40);

    println!("✅ Proof only verifies under the circuit it was made for");
}
