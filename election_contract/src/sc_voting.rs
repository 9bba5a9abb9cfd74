use alloy::{
    network::{Network, ReceiptResponse},
    primitives::{Address, U256},
    providers::Provider,
    sol,
};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::{
    to_u64, Candidate, CandidateId, ContractError, Election, ElectionConcluded, ElectionContract,
    ElectionId, ElectionResults, EVENT_CHANNEL_CAPACITY, LOCAL_CHAIN_IDS,
};

sol! {
    #[sol(rpc)]
    contract Voting {
        struct Candidate {
            uint256 id;
            string name;
            uint256 voteCount;
        }

        event ElectionConcluded(uint256 electionId, uint256 winnerId, string winnerName, uint256 winnerVotes);

        function electionCount() external view returns (uint256);
        function totalVotes() external view returns (uint256);
        function getElection(uint256 _electionId) external view returns (uint256 id, string memory name, bool isActive, uint256 candidateCount, uint256 endTime);
        function getCandidate(uint256 _electionId, uint256 _candidateId) external view returns (Candidate memory);
        function getElectionResults(uint256 _electionId) external view returns (uint256[] memory ids, string[] memory names, uint256[] memory votes, uint256 winnerId);
        function hasVotedInElection(uint256 electionId, address voter) external view returns (bool);
        function vote(uint256 electionId, uint256 candidateId) external;
        function getCurrentTimestamp() external view returns (uint256);
    }
}

/// `Voting` contract deployed on a node reachable through `P`.
pub struct ScVoting<P, N> {
    instance: Voting::VotingInstance<(), P, N>,
    address: Address,
}

impl<P, N> ScVoting<P, N>
where
    P: Provider<N> + Clone + 'static,
    N: Network,
{
    pub fn new(provider: P, address: Address) -> Self {
        Self {
            instance: Voting::new(address, provider),
            address,
        }
    }

    async fn chain_id(&self) -> Result<u64, ContractError> {
        Ok(self.instance.provider().get_chain_id().await?)
    }
}

#[async_trait]
impl<P, N> ElectionContract for ScVoting<P, N>
where
    P: Provider<N> + Clone + 'static,
    N: Network,
{
    async fn election_count(&self) -> Result<u64, ContractError> {
        let res = self.instance.electionCount().call().await?;
        to_u64(res._0)
    }

    async fn election(&self, id: ElectionId) -> Result<Election, ContractError> {
        let res = self.instance.getElection(U256::from(id)).call().await?;
        Ok(Election {
            id: to_u64(res.id)?,
            name: res.name,
            is_active: res.isActive,
            candidate_count: to_u64(res.candidateCount)?,
            deadline: to_u64(res.endTime)?,
        })
    }

    async fn candidate(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<Candidate, ContractError> {
        let res = self
            .instance
            .getCandidate(U256::from(election_id), U256::from(candidate_id))
            .call()
            .await?;
        let candidate = res._0;
        Ok(Candidate {
            id: to_u64(candidate.id)?,
            name: candidate.name,
            vote_count: to_u64(candidate.voteCount)?,
        })
    }

    async fn current_timestamp(&self) -> Result<u64, ContractError> {
        let res = self.instance.getCurrentTimestamp().call().await?;
        to_u64(res._0)
    }

    async fn has_voted(
        &self,
        election_id: ElectionId,
        voter: Address,
    ) -> Result<bool, ContractError> {
        let res = self
            .instance
            .hasVotedInElection(U256::from(election_id), voter)
            .call()
            .await?;
        Ok(res._0)
    }

    async fn results(&self, election_id: ElectionId) -> Result<ElectionResults, ContractError> {
        let res = self
            .instance
            .getElectionResults(U256::from(election_id))
            .call()
            .await
            .map_err(revert_or_contract_error)?;
        let ids = res.ids.into_iter().map(to_u64).collect::<Result<Vec<_>, _>>()?;
        let votes = res.votes.into_iter().map(to_u64).collect::<Result<Vec<_>, _>>()?;
        ElectionResults::from_parallel(election_id, ids, res.names, votes, to_u64(res.winnerId)?)
    }

    async fn total_votes(&self) -> Result<u64, ContractError> {
        let res = self.instance.totalVotes().call().await?;
        to_u64(res._0)
    }

    async fn vote(
        &self,
        voter: Address,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<(), ContractError> {
        let pending = self
            .instance
            .vote(U256::from(election_id), U256::from(candidate_id))
            .from(voter)
            .send()
            .await
            .map_err(revert_or_contract_error)?;
        debug!("Vote transaction sent: {}", pending.tx_hash());
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(ContractError::Reverted(format!(
                "vote transaction {} failed",
                receipt.transaction_hash()
            )));
        }
        info!(
            "Vote from {voter} for candidate {candidate_id} in election {election_id} confirmed"
        );
        Ok(())
    }

    async fn advance_time(&self, seconds: u64) -> Result<u64, ContractError> {
        let chain_id = self.chain_id().await?;
        if !LOCAL_CHAIN_IDS.contains(&chain_id) {
            return Err(ContractError::NotSimulated(chain_id));
        }
        let provider = self.instance.provider();
        let _: serde_json::Value = provider
            .raw_request("evm_increaseTime".into(), (seconds,))
            .await?;
        let _: serde_json::Value = provider.raw_request("evm_mine".into(), ()).await?;
        self.current_timestamp().await
    }

    async fn subscribe_conclusions(
        &self,
    ) -> Result<mpsc::Receiver<ElectionConcluded>, ContractError> {
        let poller = self
            .instance
            .ElectionConcluded_filter()
            .watch()
            .await
            .map_err(|e| ContractError::Subscription(e.to_string()))?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let address = self.address;
        tokio::spawn(async move {
            info!("Watching ElectionConcluded events of {address}");
            let stream = poller.into_stream();
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok((event, _log)) => event,
                    Err(e) => {
                        error!("Failed to decode ElectionConcluded log: {e}");
                        continue;
                    }
                };
                let notice = match concluded_from_event(event) {
                    Ok(notice) => notice,
                    Err(e) => {
                        error!("Dropping ElectionConcluded event: {e}");
                        continue;
                    }
                };
                if tx.send(notice).await.is_err() {
                    break;
                }
            }
            info!("ElectionConcluded watcher for {address} stopped");
        });
        Ok(rx)
    }
}

/// Surfaces an `execution reverted` error response as [`ContractError::Reverted`]
/// carrying the node's message.
fn revert_or_contract_error(err: alloy::contract::Error) -> ContractError {
    match err {
        alloy::contract::Error::TransportError(e) => match revert_message(&e) {
            Some(reason) => ContractError::Reverted(reason),
            None => ContractError::TransportError(e),
        },
        other => ContractError::AlloyError(other),
    }
}

fn revert_message(err: &alloy::transports::TransportError) -> Option<String> {
    err.as_error_resp()
        .filter(|payload| payload.message.contains("revert"))
        .map(|payload| payload.message.to_string())
}

fn concluded_from_event(event: Voting::ElectionConcluded) -> Result<ElectionConcluded, ContractError> {
    Ok(ElectionConcluded {
        election_id: to_u64(event.electionId)?,
        winner_id: to_u64(event.winnerId)?,
        winner_name: event.winnerName,
        winner_votes: to_u64(event.winnerVotes)?,
    })
}
