//! Minimal ABI fragments for the three on-chain collaborators the core
//! reaches through [`crate::traits`]: the PDP verifier, the service-view
//! contract, and the provider registry. Declared inline with `sol!` rather
//! than wired up as full generated contract bindings, since every call here
//! is a single function selector, not a whole interface the rest of the
//! crate consumes.

use alloy_sol_types::sol;

sol! {
    function nextPieceId(uint256 setId) external view returns (uint256);
    function provingPeriod() external view returns (uint256);
    function challengeWindow() external view returns (uint256);
    function proofFee() external view returns (uint256);
    function nextChallengeEpoch(uint256 setId) external view returns (uint256);

    function clientDataSetId(address client) external view returns (uint256);

    function isApprovedProvider(address provider) external view returns (bool);
    function registerProvider(string name, string description) external;

    function createDataSet(address serviceContractAddr, bytes extraData) external returns (uint256);
    function addPieces(uint256 setId, address extra, bytes[] pieces, bytes extraData) external;
    function removeRoot(uint256 setId, uint256 rootId) external;
    function deleteDataSet(uint256 setId) external;

    event DataSetCreated(uint256 indexed setId, address indexed owner);
    event PiecesAdded(uint256 indexed setId, uint256[] pieceIds);
    event ProviderRegistered(address indexed provider);

    // Not dispatched over RPC: declared purely so `pdp-core` can reuse the
    // macro's tuple-ABI encoder for `createDataSet`/`addPieces`'s
    // `extraData` payloads, then strip the 4-byte selector the function
    // form always prepends (extraData itself carries no selector).
    function encodeExtra(uint256 nonce, bytes signature, bytes[] metadata) external;
    function encodeAddPiecesExtra(uint256 clientDataSetId, uint256 firstAdded, bytes signature, bytes[] metadata) external;
}
